use std::fmt;

use crate::error::FetchError;

/// Terminal state of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `200`: the destination now holds the new body and validators were refreshed.
    Changed,
    /// `304`: nothing was written.
    Unchanged,
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool { !matches!(self, Self::Failed(_)) }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Result for the request at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub index:         usize,
    /// The URI as requested.
    pub uri:           String,
    /// The URI after redirects; the requested URI when no response arrived.
    pub effective_uri: String,
    pub outcome:       FetchOutcome,
}

impl FetchResult {
    pub fn is_success(&self) -> bool { self.outcome.is_success() }

    pub fn has_changed(&self) -> bool { matches!(self.outcome, FetchOutcome::Changed) }
}

impl fmt::Display for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FetchOutcome::Changed => write!(f, "{} -> Success (has changed)", self.effective_uri),
            FetchOutcome::Unchanged => write!(f, "{} -> Success (no changes)", self.effective_uri),
            FetchOutcome::Failed(err) => write!(f, "{} -> ERROR: {}", self.effective_uri, err),
        }
    }
}

/// Outcome counts of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub changed:   usize,
    pub unchanged: usize,
    pub failed:    usize,
}

impl BatchSummary {
    pub fn from_results(results: &[FetchResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.outcome {
                FetchOutcome::Changed => summary.changed += 1,
                FetchOutcome::Unchanged => summary.unchanged += 1,
                FetchOutcome::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }

    pub fn total(&self) -> usize { self.changed + self.unchanged + self.failed }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changed, {} unchanged, {} failed",
            self.changed, self.unchanged, self.failed
        )
    }
}
