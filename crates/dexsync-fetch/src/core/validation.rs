/// How a response status affects the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// `200 OK`: full body with fresh validators.
    Changed,
    /// `304 Not Modified`: stored validators still match.
    Unchanged,
    /// Anything else; carries the status code.
    Rejected(u16),
}

impl StatusClass {
    /// Only a full `200` body may be written to the destination.
    pub fn accepts_body(self) -> bool { matches!(self, Self::Changed) }
}

/// Classify an HTTP status code.
///
/// Redirects are followed by the transport, so a `3xx` other than `304`
/// reaching this point is a failure like any other unexpected status.
///
/// # Examples
///
/// ```
/// use dexsync_fetch::{StatusClass, classify_status};
///
/// assert_eq!(classify_status(200), StatusClass::Changed);
/// assert_eq!(classify_status(304), StatusClass::Unchanged);
/// assert_eq!(classify_status(404), StatusClass::Rejected(404));
/// ```
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200 => StatusClass::Changed,
        304 => StatusClass::Unchanged,
        other => StatusClass::Rejected(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_and_not_modified() {
        assert_eq!(classify_status(200), StatusClass::Changed);
        assert_eq!(classify_status(304), StatusClass::Unchanged);
    }

    #[test]
    fn test_other_success_codes_are_rejected() {
        // Partial or empty successes never update the mirror
        assert_eq!(classify_status(201), StatusClass::Rejected(201));
        assert_eq!(classify_status(204), StatusClass::Rejected(204));
        assert_eq!(classify_status(206), StatusClass::Rejected(206));
    }

    #[test]
    fn test_redirect_and_error_codes_are_rejected() {
        for code in [301, 302, 307, 400, 403, 404, 429, 500, 502, 503] {
            assert_eq!(classify_status(code), StatusClass::Rejected(code), "code {code}");
        }
    }

    #[test]
    fn test_only_changed_accepts_body() {
        assert!(StatusClass::Changed.accepts_body());
        assert!(!StatusClass::Unchanged.accepts_body());
        assert!(!StatusClass::Rejected(404).accepts_body());
    }
}
