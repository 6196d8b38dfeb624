/// Make a card name safe to use as part of a file name.
///
/// Characters reserved on common filesystems are swapped for a look-alike,
/// ASCII control characters become `_`. Everything outside ASCII is kept as
/// is, so accented and CJK names survive.
pub fn sanitize_for_path(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' => '(',
            '>' => ')',
            ':' => '-',
            '"' => '\'',
            '/' | '\\' | '|' => '-',
            '?' => ' ',
            '*' => '+',
            c if c.is_ascii_control() && c != '\u{7f}' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_characters() {
        assert_eq!(sanitize_for_path("<a>:\"b\"/c\\d|e?f*"), "(a)-'b'-c-d-e f+");
    }

    #[test]
    fn control_characters() {
        assert_eq!(sanitize_for_path("tab\there\nnew"), "tab_here_new");
    }

    #[test]
    fn plain_names_are_untouched() {
        assert_eq!(sanitize_for_path("Pikachu V"), "Pikachu V");
        assert_eq!(sanitize_for_path("Mr. Mime"), "Mr. Mime");
    }

    #[test]
    fn non_ascii_passes_through() {
        assert_eq!(sanitize_for_path("Flabébé"), "Flabébé");
        assert_eq!(sanitize_for_path("ピカチュウ"), "ピカチュウ");
        assert_eq!(sanitize_for_path("Type: Null ★"), "Type- Null ★");
    }
}
