//! Error types for dexsync-fetch.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a single transfer failed, or why the engine could not be built.
///
/// Per-transfer variants end up inside [`FetchOutcome::Failed`](crate::FetchOutcome)
/// and never abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("failed to write {}: {message}", path.display())]
    Sink { path: PathBuf, message: String },

    #[error("failed to initialize HTTP client: {0}")]
    ClientInit(String),

    #[error("transfer never completed")]
    Abandoned,
}

impl FetchError {
    pub(crate) fn transport(err: impl std::error::Error) -> Self { Self::Transport(err.to_string()) }

    pub(crate) fn sink(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Sink {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Returns `true` for failures raised below HTTP: connection, TLS, DNS or timeout.
    pub fn is_transport(&self) -> bool { matches!(self, Self::Transport(_) | Self::Timeout(_)) }
}

pub type Result<T> = std::result::Result<T, FetchError>;
