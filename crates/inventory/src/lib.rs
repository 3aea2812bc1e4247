//! Inventory domain module.
//!
//! This crate contains business rules for inventory records, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod condition;
pub mod filter;
pub mod record;

pub use condition::Condition;
pub use filter::{FilterParams, QuantityFilter, QuantityOperator, RecordFilter};
pub use record::{
    InventoryRecord, NewRecord, OrderedQuantity, RecordDraft, RecordKey, RecordPatch, UpdateFields,
};
