//! I/O layer: the HTTP client seam, destination sinks and the scheduler.
//!
//! Everything that touches the network or the filesystem lives here; the
//! decisions it acts on come from [`crate::core`].

mod engine;
mod http;
mod sink;
mod transfer;

pub use engine::Engine;
pub use http::{BoxStream, HttpClient, HttpResponse};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use sink::Sink;
