use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockroom_core::ExpectedVersion;
use stockroom_inventory::{InventoryRecord, RecordFilter, RecordKey};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same identity pair already exists.
    #[error("record already exists: {0}")]
    Duplicate(RecordKey),

    #[error("record not found: {0}")]
    NotFound(RecordKey),

    /// The stored row moved on since it was read.
    #[error("version mismatch for {key} (expected: {expected:?}, actual: {actual})")]
    VersionMismatch {
        key: RecordKey,
        expected: ExpectedVersion,
        actual: u64,
    },

    /// Anything the backend reports that is not one of the above.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence for inventory records.
///
/// Implementations own version bookkeeping: `insert` stores the record as given
/// (version 1 for fresh records) and `update` bumps the version by one, but only
/// when `expected` matches what is stored.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError>;

    async fn get(&self, key: &RecordKey) -> Result<Option<InventoryRecord>, StoreError>;

    async fn update(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError>;

    /// Remove a record permanently. Returns `false` if nothing was stored under `key`.
    async fn delete(&self, key: &RecordKey) -> Result<bool, StoreError>;

    /// Records matching `filter`, ordered by identity pair.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<InventoryRecord>, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
        (**self).insert(record).await
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<InventoryRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn update(
        &self,
        record: InventoryRecord,
        expected: ExpectedVersion,
    ) -> Result<InventoryRecord, StoreError> {
        (**self).update(record, expected).await
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list(filter).await
    }
}
