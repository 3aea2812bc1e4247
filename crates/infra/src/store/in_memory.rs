use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::RwLock;

use async_trait::async_trait;

use stockroom_core::{Entity, ExpectedVersion};
use stockroom_inventory::{InventoryRecord, RecordFilter, RecordKey};

use super::{InventoryStore, StoreError};

/// In-memory inventory store for tests/dev.
///
/// The version check and the write happen under one write lock, which makes
/// `update` an atomic compare-and-swap.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<BTreeMap<RecordKey, InventoryRecord>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.entry(record.key) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(record.key)),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<InventoryRecord>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(key).cloned())
    }

    async fn update(
        &self,
        mut record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let key = *record.id();
        let stored = map.get_mut(&key).ok_or(StoreError::NotFound(key))?;

        if !expected.matches(stored.version()) {
            return Err(StoreError::VersionMismatch {
                key,
                expected,
                actual: stored.version(),
            });
        }

        record.version = stored.version() + 1;
        record.created_at = stored.created_at;
        *stored = record.clone();
        Ok(record)
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        Ok(map.remove(key).is_some())
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<InventoryRecord>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().filter(|r| filter.matches(r)).cloned().collect())
    }
}
