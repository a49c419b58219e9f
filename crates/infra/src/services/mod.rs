//! Application services: the use cases the HTTP layer calls.

pub mod catalog;
pub mod transactions;

use std::sync::Arc;

pub use catalog::CatalogService;
pub use transactions::{ReorderSuggestion, TransactionService};

use crate::engine::{EngineConfig, TransitionEngine};
use crate::store::{CatalogStore, InMemoryInventoryStore, InventoryStore};

/// Every service wired against one store.
#[derive(Clone)]
pub struct Services {
    pub transactions: TransactionService,
    pub catalog: CatalogService,
}

impl Services {
    pub fn new<S>(store: Arc<S>, engine: EngineConfig) -> Self
    where
        S: InventoryStore + CatalogStore + 'static,
    {
        let inventory: Arc<dyn InventoryStore> = store.clone();
        let catalog: Arc<dyn CatalogStore> = store;
        let engine = TransitionEngine::new(inventory.clone(), engine);
        Self {
            transactions: TransactionService::new(inventory, catalog.clone(), engine),
            catalog: CatalogService::new(catalog),
        }
    }

    pub fn in_memory(engine: EngineConfig) -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()), engine)
    }
}
