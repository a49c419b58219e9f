use std::sync::Arc;

use tracing::info;

use stockledger_infra::config::AppConfig;
use stockledger_infra::store::PostgresInventoryStore;
use stockledger_infra::{CatalogService, EngineConfig, Services, StoreError, TransactionService};

/// Which store the services run against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Postgres => "postgres",
        }
    }
}

/// Everything a handler needs, shared behind an `Arc` extension.
#[derive(Clone)]
pub struct AppServices {
    pub transactions: TransactionService,
    pub catalog: CatalogService,
    pub backend: Backend,
}

impl AppServices {
    pub fn new(services: Services, backend: Backend) -> Self {
        Self {
            transactions: services.transactions,
            catalog: services.catalog,
            backend,
        }
    }

    pub fn in_memory(engine: EngineConfig) -> Self {
        Self::new(Services::in_memory(engine), Backend::Memory)
    }
}

/// Wire the services for `config`: Postgres when a database URL is
/// configured (schema applied on start), the in-memory store otherwise.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    let Some(db) = &config.database else {
        info!("DATABASE_URL not set; using in-memory store");
        return Ok(AppServices::in_memory(config.engine));
    };

    let store = PostgresInventoryStore::connect(&db.url, db.max_connections, db.acquire_timeout)
        .await?
        .with_lock_timeout(db.lock_timeout);
    store.migrate().await?;
    info!(max_connections = db.max_connections, "connected to postgres");

    Ok(AppServices::new(
        Services::new(Arc::new(store), config.engine),
        Backend::Postgres,
    ))
}
