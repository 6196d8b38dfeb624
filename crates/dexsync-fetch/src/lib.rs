//! Bounded-concurrency incremental HTTP fetching.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable requests, options and results
//! - [`core`] - Pure transformations (conditional headers, status classification)
//! - [`effects`] - I/O: the HTTP client seam, sinks and the scheduling engine
//!
//! # Key Features
//!
//! - **Conditional**: stored `ETag`/`Last-Modified` validators turn repeat
//!   fetches into `304 Not Modified` round trips
//! - **Bounded**: at most `window` transfers are open at any instant
//! - **Lazy Sinks**: destination files are only touched once body bytes arrive
//! - **Index-Aligned**: one result per request, in request order

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::{StatusClass, classify_status, conditional_headers};
pub use data::{
    BatchProgress, BatchSummary, DEFAULT_ACCEPT, DEFAULT_USER_AGENT, EngineOptions, FetchOutcome,
    FetchRequest, FetchResult, ProgressCallback, Target,
};
pub use effects::{BoxStream, Engine, HttpClient, HttpResponse, Sink};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use dexsync_store::{ValidatorStore, Validators};
pub use error::{FetchError, Result};
