//! Inventory record storage.
//!
//! Stores are keyed by the (product_id, condition) identity pair and support
//! version-checked updates; orchestration lives in `record_service`.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{InventoryStore, StoreError};
