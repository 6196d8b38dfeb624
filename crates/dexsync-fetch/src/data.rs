//! Data layer: immutable requests, engine options and batch results.

mod options;
mod progress;
mod request;
mod result;

pub use options::{DEFAULT_ACCEPT, DEFAULT_USER_AGENT, EngineOptions, ProgressCallback};
pub use progress::BatchProgress;
pub use request::{FetchRequest, Target};
pub use result::{BatchSummary, FetchOutcome, FetchResult};
