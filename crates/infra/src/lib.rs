//! Infrastructure layer: record storage, service orchestration, config.

pub mod config;
pub mod record_service;
pub mod store;

pub use config::{AppConfig, ConfigError, StoreConfig};
pub use record_service::{RecordService, ServiceError};
pub use store::{InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, StoreError};
