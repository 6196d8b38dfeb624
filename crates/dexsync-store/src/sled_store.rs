use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::{ValidatorStore, Validators};

/// Persistent validator store on an embedded `sled` database.
///
/// Records are encoded with `postcard`; keys are the hex-encoded URI under a
/// `uri:` prefix so that the whole table can be scanned without decoding
/// unrelated trees.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: sled::Db,
}

struct DbKeys;

impl DbKeys {
    const URI_PREFIX: &'static str = "uri:";

    fn uri_key(uri: &str) -> Vec<u8> { format!("{}{}", Self::URI_PREFIX, hex::encode(uri)).into_bytes() }
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        debug!(path = %path.display(), records = db.len(), "opened validator store");
        Ok(Self { db })
    }

    /// Open a throwaway database that is removed when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn len(&self) -> usize { self.db.scan_prefix(DbKeys::URI_PREFIX).count() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// All stored records, in key order.
    pub fn records(&self) -> Result<Vec<Validators>> {
        let mut records = Vec::new();
        for entry in self.db.scan_prefix(DbKeys::URI_PREFIX) {
            let (_, val) = entry?;
            records.push(postcard::from_bytes(&val)?);
        }
        Ok(records)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<usize> { Ok(self.db.flush()?) }
}

impl ValidatorStore for SledStore {
    fn get(&self, uri: &str) -> Result<Option<Validators>> {
        match self.db.get(DbKeys::uri_key(uri))? {
            Some(data) => Ok(Some(postcard::from_bytes(&data)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, validators: &Validators) -> Result<()> {
        let val = postcard::to_allocvec(validators)?;
        self.db.insert(DbKeys::uri_key(&validators.uri), val)?;
        Ok(())
    }
}
