//! Inventory domain module.
//!
//! Business rules for products, locations, warehouses, stock transactions and
//! the stock ledger, implemented as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod ledger;
pub mod location;
pub mod movement;
pub mod product;
pub mod reorder;
pub mod stock;
pub mod transaction;
pub mod warehouse;

pub use ledger::{LedgerEntry, LedgerFilter, NewLedgerEntry};
pub use location::{Location, NewLocation};
pub use movement::{StockMovement, net_deltas};
pub use product::{NewProduct, Product, ProductSummary};
pub use reorder::{reorder_draft, suggested_reorder_quantity};
pub use stock::{StockKey, StockLevel};
pub use transaction::{
    AdjustmentDirection, ItemDraft, MAX_ITEM_QUANTITY, NewTransaction, StockTransaction,
    TransactionDraft, TransactionItem, TransactionKind, TransactionStatus, TransactionType,
};
pub use warehouse::{NewWarehouse, Warehouse, WarehouseKind};
