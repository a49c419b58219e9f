//! Infrastructure layer: stores, the transition engine, application services
//! and configuration.

pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod store;


pub use engine::{EngineConfig, TransitionEngine};
pub use error::{InventoryError, InventoryResult, StoreError};
pub use services::{CatalogService, ReorderSuggestion, Services, TransactionService};
