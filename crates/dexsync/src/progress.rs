use dexsync_fetch::BatchProgress;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

const PB_STYLE: &str = "{spinner:.blue} {prefix:>8.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} ({per_sec}, {eta}) {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<Option<ProgressStyle>> = Lazy::new(|| {
    let pb_style = match ProgressStyle::with_template(PB_STYLE) {
        Ok(pb_style) => pb_style.tick_chars(TICK).progress_chars(PB_CHARS),
        Err(_) => return None,
    };

    Some(pb_style)
});

/// Terminal bar following one batch.
#[derive(Clone)]
pub struct BatchTracker {
    pb: ProgressBar,
}

impl BatchTracker {
    pub fn update(&self, progress: &BatchProgress) {
        self.pb.set_position(progress.completed as u64);
        self.pb.set_message(format!(
            "{} changed, {} unchanged, {} failed",
            progress.changed, progress.unchanged, progress.failed
        ));
    }

    pub fn finish(&self) { self.pb.finish(); }

    #[cfg(test)]
    fn position(&self) -> u64 { self.pb.position() }
}

#[derive(Debug, Clone, Default)]
pub struct BatchTrackerBuilder {
    len:    u64,
    prefix: Option<String>,
    hidden: bool,
}

impl BatchTrackerBuilder {
    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len as u64;
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn build(self) -> BatchTracker {
        let pb = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(self.len)
        };
        pb.set_length(self.len);
        let pb = match PB_TEMPLATE.as_ref() {
            Some(style) => pb.with_style(style.clone()),
            None => pb,
        };

        if let Some(prefix) = self.prefix {
            pb.set_prefix(prefix);
        }
        BatchTracker { pb }
    }
}
