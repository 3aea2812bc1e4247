//! Record operation pipeline (application-level orchestration).
//!
//! Every mutating operation runs the same shape:
//!
//! ```text
//! request fields
//!   ↓
//! 1. Validate into domain types (no IO; rejects before anything is read)
//!   ↓
//! 2. Load the current record (and its version) from the store
//!   ↓
//! 3. Decide the next state (pure domain logic on `InventoryRecord`)
//!   ↓
//! 4. Conditional write: update only if the stored version is still the one read
//!   ↓
//! 5. On a version mismatch, go back to 2 (bounded by `max_write_attempts`)
//! ```
//!
//! Step 4 is what keeps two concurrent checkouts from overselling: the loser
//! re-reads the decremented stock and the domain rule rejects it.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockroom_core::{DomainError, DomainResult, Entity, ExpectedVersion};
use stockroom_inventory::{
    FilterParams, InventoryRecord, OrderedQuantity, RecordDraft, RecordKey, UpdateFields,
};

use crate::store::{InventoryStore, StoreError};

pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed, missing or wrong-typed input.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// Identity pair already taken.
    #[error("{0}")]
    Conflict(String),
    /// Well-formed request rejected by a business rule.
    #[error("{0}")]
    NotAllowed(String),
    /// Lost every compare-and-swap round against concurrent writers.
    #[error("{0}")]
    Concurrency(String),
    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn not_found(key: &RecordKey) -> Self {
        Self::NotFound(format!(
            "Product with id '{}' and condition '{}' was not found.",
            key.product_id, key.condition
        ))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::NotAllowed(msg) => Self::NotAllowed(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(key) => Self::Conflict(duplicate_message(&key)),
            StoreError::NotFound(key) => Self::not_found(&key),
            StoreError::VersionMismatch { .. } => Self::Concurrency(err.to_string()),
            StoreError::Backend(_) => Self::Store(err),
        }
    }
}

fn duplicate_message(key: &RecordKey) -> String {
    format!(
        "Product with id '{}' and condition '{}' already exists.",
        key.product_id, key.condition
    )
}

/// Inventory record operations over an injected store.
#[derive(Debug)]
pub struct RecordService<S> {
    store: S,
    max_write_attempts: u32,
}

impl<S> RecordService<S>
where
    S: InventoryStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    #[instrument(skip(self, draft), fields(product_id = draft.product_id), err)]
    pub async fn create(&self, draft: RecordDraft) -> Result<InventoryRecord, ServiceError> {
        let new_record = draft.validate()?;
        let key = new_record.key;

        if self.store.get(&key).await?.is_some() {
            return Err(ServiceError::Conflict(duplicate_message(&key)));
        }

        // The store enforces uniqueness too, so a racing insert still lands as a conflict.
        let stored = self.store.insert(new_record.into_record(Utc::now())).await?;
        info!(%key, "inventory record created");
        Ok(stored)
    }

    pub async fn get(&self, key: &RecordKey) -> Result<InventoryRecord, ServiceError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| ServiceError::not_found(key))
    }

    pub async fn list(&self, params: FilterParams) -> Result<Vec<InventoryRecord>, ServiceError> {
        let filter = params.into_filter()?;
        let records = self.store.list(&filter).await?;
        debug!(count = records.len(), filtered = !filter.is_empty(), "listed inventory records");
        Ok(records)
    }

    #[instrument(skip(self, changes), fields(key = %key), err)]
    pub async fn update(
        &self,
        key: RecordKey,
        changes: UpdateFields,
    ) -> Result<InventoryRecord, ServiceError> {
        let patch = changes.validate(&key)?;
        let updated = self
            .read_modify_write(key, |current| Ok(current.patched(&patch, Utc::now())))
            .await?;
        info!(%key, version = updated.version(), "inventory record updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn checkout(
        &self,
        key: RecordKey,
        ordered_quantity: i64,
    ) -> Result<InventoryRecord, ServiceError> {
        let ordered = OrderedQuantity::new(ordered_quantity)?;
        let updated = self
            .read_modify_write(key, |current| current.checked_out(ordered, Utc::now()))
            .await?;
        info!(
            %key,
            ordered = ordered.get(),
            remaining = updated.quantity.get(),
            active = updated.active,
            "inventory checked out"
        );
        Ok(updated)
    }

    #[instrument(skip(self), fields(key = %key), err)]
    pub async fn delete(&self, key: RecordKey) -> Result<(), ServiceError> {
        if !self.store.delete(&key).await? {
            return Err(ServiceError::not_found(&key));
        }
        info!(%key, "inventory record deleted");
        Ok(())
    }

    async fn read_modify_write<F>(
        &self,
        key: RecordKey,
        decide: F,
    ) -> Result<InventoryRecord, ServiceError>
    where
        F: Fn(&InventoryRecord) -> DomainResult<InventoryRecord>,
    {
        for attempt in 1..=self.max_write_attempts {
            let current = self.get(&key).await?;
            let next = decide(&current)?;

            match self
                .store
                .update(next, ExpectedVersion::Exact(current.version()))
                .await
            {
                Ok(stored) => return Ok(stored),
                Err(StoreError::VersionMismatch { actual, .. }) => {
                    debug!(%key, attempt, read = current.version(), actual, "version moved, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%key, attempts = self.max_write_attempts, "gave up after repeated version conflicts");
        Err(ServiceError::Concurrency(format!(
            "{key} is being modified concurrently; retry the request"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use stockroom_core::{ProductId, Quantity};
    use stockroom_inventory::{Condition, RecordFilter};

    use super::*;
    use crate::store::InMemoryInventoryStore;

    fn key(product_id: i64, condition: Condition) -> RecordKey {
        RecordKey::new(ProductId::new(product_id), condition)
    }

    fn monitor_draft() -> RecordDraft {
        RecordDraft {
            product_id: 1,
            condition: Some("new".into()),
            name: Some("monitor".into()),
            quantity: Some(10),
            reorder_quantity: Some(20),
            restock_level: Some(2),
            active: None,
        }
    }

    fn service() -> RecordService<InMemoryInventoryStore> {
        RecordService::new(InMemoryInventoryStore::new())
    }

    #[tokio::test]
    async fn create_then_get_returns_same_fields() {
        let svc = service();
        let created = svc.create(monitor_draft()).await.unwrap();
        let fetched = svc.get(&key(1, Condition::New)).await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.name.as_deref(), Some("monitor"));
        assert_eq!(fetched.quantity.get(), 10);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts_and_keeps_first() {
        let svc = service();
        svc.create(monitor_draft()).await.unwrap();

        let mut second = monitor_draft();
        second.quantity = Some(99);
        let err = svc.create(second).await.unwrap_err();
        match err {
            ServiceError::Conflict(msg) => {
                assert!(msg.contains("'1'"));
                assert!(msg.contains("'new'"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(svc.get(&key(1, Condition::New)).await.unwrap().quantity.get(), 10);
    }

    #[tokio::test]
    async fn rejected_update_writes_nothing() {
        let svc = service();
        let before = svc.create(monitor_draft()).await.unwrap();

        let err = svc
            .update(
                before.key,
                UpdateFields {
                    name: Some("renamed".into()),
                    quantity: Some(3),
                    reorder_quantity: Some(-1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(svc.get(&before.key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let svc = service();
        let err = svc
            .update(key(42, Condition::Used), UpdateFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn checkout_over_stock_leaves_record_untouched() {
        let svc = service();
        let before = svc.create(monitor_draft()).await.unwrap();
        let err = svc.checkout(before.key, 11).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAllowed(_)));
        assert_eq!(svc.get(&before.key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn checkout_to_zero_then_again_is_not_allowed() {
        let svc = service();
        let rec = svc.create(monitor_draft()).await.unwrap();

        let drained = svc.checkout(rec.key, 10).await.unwrap();
        assert_eq!(drained.quantity, Quantity::ZERO);
        assert!(!drained.active);
        assert_eq!(drained.version, 2);

        let err = svc.checkout(rec.key, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn checkout_rejects_non_positive_orders() {
        let svc = service();
        let rec = svc.create(monitor_draft()).await.unwrap();
        assert!(matches!(
            svc.checkout(rec.key, 0).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_permanent() {
        let svc = service();
        let rec = svc.create(monitor_draft()).await.unwrap();
        svc.delete(rec.key).await.unwrap();
        assert!(matches!(svc.get(&rec.key).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.delete(rec.key).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_with_bad_filter_is_validation_error() {
        let svc = service();
        let err = svc
            .list(FilterParams {
                condition: Some("pristine".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    /// Store wrapper that sneaks in one competing checkout right before the first
    /// conditional write, so the service's first compare-and-swap loses.
    struct RacingStore {
        inner: InMemoryInventoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl InventoryStore for RacingStore {
        async fn insert(&self, record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
            self.inner.insert(record).await
        }

        async fn get(&self, key: &RecordKey) -> Result<Option<InventoryRecord>, StoreError> {
            self.inner.get(key).await
        }

        async fn update(
            &self,
            record: InventoryRecord,
            expected: ExpectedVersion,
        ) -> Result<InventoryRecord, StoreError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut rival = self.inner.get(&record.key).await?.expect("seeded");
                rival.quantity = rival.quantity.checked_sub(Quantity::new(7).unwrap()).unwrap();
                self.inner.update(rival, ExpectedVersion::Any).await?;
            }
            self.inner.update(record, expected).await
        }

        async fn delete(&self, key: &RecordKey) -> Result<bool, StoreError> {
            self.inner.delete(key).await
        }

        async fn list(&self, filter: &RecordFilter) -> Result<Vec<InventoryRecord>, StoreError> {
            self.inner.list(filter).await
        }
    }

    #[tokio::test]
    async fn lost_race_rereads_before_deciding_again() {
        let svc = RecordService::new(RacingStore {
            inner: InMemoryInventoryStore::new(),
            raced: AtomicBool::new(false),
        });
        let rec = svc.create(monitor_draft()).await.unwrap();

        // 10 in stock when first read, but a rival takes 7 before our write lands.
        // The retry sees 3 left, so ordering 5 must now be refused.
        let err = svc.checkout(rec.key, 5).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAllowed(_)));
        assert_eq!(svc.get(&rec.key).await.unwrap().quantity.get(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_full_checkouts_sell_once() {
        let svc = Arc::new(service().with_max_write_attempts(10));
        let rec = svc.create(monitor_draft()).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.checkout(rec.key, 10).await }));
        }

        let mut sold = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                sold += 1;
            }
        }
        assert_eq!(sold, 1);
        let after = svc.get(&rec.key).await.unwrap();
        assert_eq!(after.quantity, Quantity::ZERO);
        assert!(!after.active);
    }
}
