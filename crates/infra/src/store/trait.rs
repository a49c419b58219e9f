use std::sync::Arc;

use async_trait::async_trait;

use stockledger_core::{LocationId, ProductId, TransactionId, WarehouseId};
use stockledger_inventory::{
    LedgerEntry, LedgerFilter, Location, NewLedgerEntry, Product, ProductSummary, StockKey,
    StockLevel, StockTransaction, Warehouse,
};

use super::query::{Page, Pagination, ProductFilter, StockFilter, TransactionFilter};
use crate::error::StoreError;

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// The decrement was written; carries the new quantity.
    Applied(i64),
    /// Nothing was written; carries the quantity that was available.
    Insufficient { available: i64 },
}

/// Result of a catalog delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Still referenced: by a transaction or non-zero stock for products and
    /// warehouses, by a warehouse for locations.
    InUse,
}

/// One atomic unit of work over stock, ledger and transaction records.
///
/// Everything written through the scope becomes visible to others only on
/// [`commit`](StockLedgerTx::commit). Dropping the scope without committing
/// discards every write.
///
/// Implementations must:
/// - never let a stock quantity go below zero
/// - make the check and the write of a decrement one atomic step per key
/// - give ledger rows strictly increasing sequence numbers
#[async_trait]
pub trait StockLedgerTx: Send {
    /// Load a transaction and hold it against concurrent writers until the
    /// scope ends.
    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<StockTransaction>, StoreError>;

    /// Current quantity; 0 when the key has no row.
    async fn quantity(&mut self, key: &StockKey) -> Result<i64, StoreError>;

    /// Add `amount > 0` to the key, creating the row when missing. Returns the
    /// new quantity.
    async fn increment(&mut self, key: &StockKey, amount: i64) -> Result<i64, StoreError>;

    /// Subtract `amount > 0` from the key only if enough is available.
    async fn decrement(&mut self, key: &StockKey, amount: i64) -> Result<Decrement, StoreError>;

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    /// Persist the current state of an existing transaction.
    async fn save_transaction(&mut self, txn: &StockTransaction) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Stock, ledger and transaction persistence.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Open an atomic scope.
    async fn begin(&self) -> Result<Box<dyn StockLedgerTx>, StoreError>;

    async fn stock_quantity(&self, key: &StockKey) -> Result<i64, StoreError>;

    /// Stock rows matching the filter, ordered by key.
    async fn list_stock(&self, filter: StockFilter) -> Result<Vec<StockLevel>, StoreError>;

    /// Ledger rows matching the filter in append order.
    async fn ledger_entries(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerEntry>, StoreError>;

    /// Store a freshly opened transaction.
    async fn insert_transaction(&self, txn: &StockTransaction) -> Result<(), StoreError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>, StoreError>;

    /// Transactions matching the filter, newest first.
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<StockTransaction>, StoreError>;
}

/// Location, product and warehouse persistence.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the name is taken.
    async fn insert_location(&self, location: &Location) -> Result<(), StoreError>;
    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError>;
    /// Ordered by name.
    async fn list_locations(&self, pagination: Pagination) -> Result<Page<Location>, StoreError>;
    async fn delete_location(&self, id: LocationId) -> Result<DeleteOutcome, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the sku is taken.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    /// Products matching the filter with their total stock, ordered by name.
    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductSummary>, StoreError>;
    async fn delete_product(&self, id: ProductId) -> Result<DeleteOutcome, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the short code is taken.
    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError>;
    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError>;
    async fn list_warehouses(&self, pagination: Pagination) -> Result<Page<Warehouse>, StoreError>;
    async fn delete_warehouse(&self, id: WarehouseId) -> Result<DeleteOutcome, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StockLedgerTx>, StoreError> {
        (**self).begin().await
    }

    async fn stock_quantity(&self, key: &StockKey) -> Result<i64, StoreError> {
        (**self).stock_quantity(key).await
    }

    async fn list_stock(&self, filter: StockFilter) -> Result<Vec<StockLevel>, StoreError> {
        (**self).list_stock(filter).await
    }

    async fn ledger_entries(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        (**self).ledger_entries(filter, pagination).await
    }

    async fn insert_transaction(&self, txn: &StockTransaction) -> Result<(), StoreError> {
        (**self).insert_transaction(txn).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>, StoreError> {
        (**self).get_transaction(id).await
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<StockTransaction>, StoreError> {
        (**self).list_transactions(filter, pagination).await
    }
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        (**self).insert_location(location).await
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        (**self).get_location(id).await
    }

    async fn list_locations(&self, pagination: Pagination) -> Result<Page<Location>, StoreError> {
        (**self).list_locations(pagination).await
    }

    async fn delete_location(&self, id: LocationId) -> Result<DeleteOutcome, StoreError> {
        (**self).delete_location(id).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductSummary>, StoreError> {
        (**self).list_products(filter, pagination).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<DeleteOutcome, StoreError> {
        (**self).delete_product(id).await
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        (**self).insert_warehouse(warehouse).await
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        (**self).get_warehouse(id).await
    }

    async fn list_warehouses(&self, pagination: Pagination) -> Result<Page<Warehouse>, StoreError> {
        (**self).list_warehouses(pagination).await
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> Result<DeleteOutcome, StoreError> {
        (**self).delete_warehouse(id).await
    }
}
