//! Cache-validator persistence for incremental mirroring.
//!
//! A [`ValidatorStore`] remembers, per requested URI, the `ETag` and
//! `Last-Modified` tokens returned by the last full (`200`) response. The
//! fetch engine reads them to build conditional requests and writes them back
//! only after a successful changed transfer.
//!
//! Two backends are provided:
//! - [`SledStore`] - persistent, embedded key/value store
//! - [`MemoryStore`] - in-process map for tests and dry runs

mod error;
mod memory;
mod sled_store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Cache validators recorded for one URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    /// The requested URI these validators belong to.
    pub uri: String,
    /// Opaque entity tag, sent back as `If-None-Match`.
    pub etag: Option<String>,
    /// Opaque modification token, sent back as `If-Modified-Since`.
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            etag: None,
            last_modified: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    /// Returns `true` when neither token carries a value.
    pub fn is_empty(&self) -> bool {
        self.etag.as_deref().is_none_or(str::is_empty)
            && self.last_modified.as_deref().is_none_or(str::is_empty)
    }
}

/// Key/value contract for validator persistence.
///
/// `get` must be free of side effects. `upsert` is idempotent and
/// last-write-wins per URI. Implementations are not required to serialize a
/// read and a later write of the same URI; callers keep URIs unique within
/// one batch.
pub trait ValidatorStore: Send + Sync {
    fn get(&self, uri: &str) -> Result<Option<Validators>>;

    fn upsert(&self, validators: &Validators) -> Result<()>;
}

impl<T: ValidatorStore + ?Sized> ValidatorStore for &T {
    fn get(&self, uri: &str) -> Result<Option<Validators>> { (**self).get(uri) }

    fn upsert(&self, validators: &Validators) -> Result<()> { (**self).upsert(validators) }
}

impl<T: ValidatorStore + ?Sized> ValidatorStore for Arc<T> {
    fn get(&self, uri: &str) -> Result<Option<Validators>> { (**self).get(uri) }

    fn upsert(&self, validators: &Validators) -> Result<()> { (**self).upsert(validators) }
}
