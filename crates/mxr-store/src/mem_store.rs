use crate::{StateStore, StoreResult, validate_key};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// In-memory record store. Clones share the same records, which lets tests
/// hand one clone to a consumer and inspect what it persisted through another.
#[derive(Clone, Default)]
pub struct MemStateStore {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl std::fmt::Debug for MemStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStateStore")
            .field("records", &self.len())
            .finish()
    }
}

impl MemStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemStateStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        validate_key(key)?;
        let guard = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        validate_key(key)?;
        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        let mut guard = self.records.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(key);
        Ok(())
    }
}
