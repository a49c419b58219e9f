//! Storage boundary for stock, ledger, transactions and the catalog.
//!
//! Writes that must be atomic go through a [`StockLedgerTx`] scope obtained
//! from [`InventoryStore::begin`]; everything else is a plain read or a
//! single-row write.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use query::{Page, Pagination, ProductFilter, StockFilter, TransactionFilter};
pub use r#trait::{CatalogStore, Decrement, DeleteOutcome, InventoryStore, StockLedgerTx};
