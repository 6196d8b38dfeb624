use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::{ValidatorStore, Validators};

/// Non-persistent store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Validators>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.records.lock().map(|r| r.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl FromIterator<Validators> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = Validators>>(iter: I) -> Self {
        let records = iter.into_iter().map(|v| (v.uri.clone(), v)).collect();
        Self {
            records: Mutex::new(records),
        }
    }
}

impl ValidatorStore for MemoryStore {
    fn get(&self, uri: &str) -> Result<Option<Validators>> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(uri).cloned())
    }

    fn upsert(&self, validators: &Validators) -> Result<()> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert(validators.uri.clone(), validators.clone());
        Ok(())
    }
}
