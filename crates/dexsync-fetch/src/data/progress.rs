use std::fmt;

/// Snapshot of a running batch.
///
/// `in_flight` is always `admitted - completed` and never exceeds the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchProgress {
    pub total:     usize,
    pub admitted:  usize,
    pub in_flight: usize,
    pub completed: usize,
    pub changed:   usize,
    pub unchanged: usize,
    pub failed:    usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f32 / self.total as f32) * 100.0
        }
    }

    pub fn is_finished(&self) -> bool { self.completed == self.total }
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.1}%), {} in flight",
            self.completed,
            self.total,
            self.percentage(),
            self.in_flight
        )
    }
}
