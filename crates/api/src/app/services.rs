use std::sync::Arc;

use stockroom_infra::{
    AppConfig, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, RecordService,
    StoreConfig, StoreError,
};

/// Which store backs the running service (reported by the index endpoint).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::InMemory => "in_memory",
            StoreBackend::Postgres => "postgres",
        }
    }
}

pub type SharedStore = Arc<dyn InventoryStore>;

/// Everything the handlers need, shared behind an `Arc` extension.
pub struct AppServices {
    records: RecordService<SharedStore>,
    backend: StoreBackend,
}

impl AppServices {
    pub fn new(store: SharedStore, backend: StoreBackend, max_write_attempts: u32) -> Self {
        Self {
            records: RecordService::new(store).with_max_write_attempts(max_write_attempts),
            backend,
        }
    }

    /// Fresh, empty in-memory services with default settings.
    pub fn in_memory() -> Self {
        let defaults = AppConfig::default();
        Self::new(
            Arc::new(InMemoryInventoryStore::new()),
            StoreBackend::InMemory,
            defaults.max_write_attempts,
        )
    }

    pub fn records(&self) -> &RecordService<SharedStore> {
        &self.records
    }

    pub fn backend(&self) -> StoreBackend {
        self.backend
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    match &config.store {
        StoreConfig::InMemory => {
            tracing::info!("using in-memory inventory store");
            Ok(AppServices::new(
                Arc::new(InMemoryInventoryStore::new()),
                StoreBackend::InMemory,
                config.max_write_attempts,
            ))
        }
        StoreConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresInventoryStore::connect(database_url, *max_connections).await?;
            tracing::info!(max_connections, "using postgres inventory store");
            Ok(AppServices::new(
                Arc::new(store),
                StoreBackend::Postgres,
                config.max_write_attempts,
            ))
        }
    }
}
