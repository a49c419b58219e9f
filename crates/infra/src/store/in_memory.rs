use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stockledger_core::{LedgerEntryId, LocationId, ProductId, TransactionId, WarehouseId};
use stockledger_inventory::{
    LedgerEntry, LedgerFilter, Location, NewLedgerEntry, Product, ProductSummary, StockKey,
    StockLevel, StockTransaction, Warehouse,
};

use super::query::{Page, Pagination, ProductFilter, StockFilter, TransactionFilter};
use super::r#trait::{CatalogStore, Decrement, DeleteOutcome, InventoryStore, StockLedgerTx};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    stock: BTreeMap<StockKey, i64>,
    ledger: Vec<LedgerEntry>,
    transactions: HashMap<TransactionId, StockTransaction>,
    locations: HashMap<LocationId, Location>,
    products: HashMap<ProductId, Product>,
    warehouses: HashMap<WarehouseId, Warehouse>,
}

impl State {
    fn next_sequence(&self) -> u64 {
        self.ledger.last().map(|e| e.sequence).unwrap_or(0) + 1
    }

    fn product_in_use(&self, id: ProductId) -> bool {
        self.transactions
            .values()
            .any(|t| t.items.iter().any(|i| i.product_id == id))
            || self.stock.iter().any(|(k, q)| k.product_id == id && *q != 0)
    }

    fn total_stock(&self, id: ProductId) -> i64 {
        self.stock
            .iter()
            .filter(|(k, _)| k.product_id == id)
            .map(|(_, q)| *q)
            .sum()
    }

    fn warehouse_in_use(&self, id: WarehouseId) -> bool {
        self.transactions.values().any(|t| t.kind.warehouses().contains(&id))
            || self.stock.iter().any(|(k, q)| k.warehouse_id == id && *q != 0)
    }
}

/// In-memory store.
///
/// Intended for tests/dev. A single async mutex serialises every atomic scope,
/// so validations never interleave; reads outside a scope wait for the
/// running scope to finish.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Scope over the locked state. Writes are staged and merged on commit.
struct InMemoryTx {
    state: OwnedMutexGuard<State>,
    stock: BTreeMap<StockKey, i64>,
    ledger: Vec<LedgerEntry>,
    transactions: HashMap<TransactionId, StockTransaction>,
}

impl InMemoryTx {
    fn current(&self, key: &StockKey) -> i64 {
        self.stock
            .get(key)
            .or_else(|| self.state.stock.get(key))
            .copied()
            .unwrap_or(0)
    }
}

fn ensure_positive(amount: i64) -> Result<(), StoreError> {
    if amount <= 0 {
        return Err(StoreError::InvalidArgument(format!(
            "stock amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[async_trait]
impl StockLedgerTx for InMemoryTx {
    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<StockTransaction>, StoreError> {
        Ok(self
            .transactions
            .get(&id)
            .or_else(|| self.state.transactions.get(&id))
            .cloned())
    }

    async fn quantity(&mut self, key: &StockKey) -> Result<i64, StoreError> {
        Ok(self.current(key))
    }

    async fn increment(&mut self, key: &StockKey, amount: i64) -> Result<i64, StoreError> {
        ensure_positive(amount)?;
        let next = self
            .current(key)
            .checked_add(amount)
            .ok_or_else(|| StoreError::InvalidArgument(format!("stock overflow at {key}")))?;
        self.stock.insert(*key, next);
        Ok(next)
    }

    async fn decrement(&mut self, key: &StockKey, amount: i64) -> Result<Decrement, StoreError> {
        ensure_positive(amount)?;
        let available = self.current(key);
        if available < amount {
            return Ok(Decrement::Insufficient { available });
        }
        let next = available - amount;
        self.stock.insert(*key, next);
        Ok(Decrement::Applied(next))
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let sequence = self
            .ledger
            .last()
            .map(|e| e.sequence + 1)
            .unwrap_or_else(|| self.state.next_sequence());
        let stored = entry.into_entry(LedgerEntryId::new(), sequence, Utc::now());
        self.ledger.push(stored.clone());
        Ok(stored)
    }

    async fn save_transaction(&mut self, txn: &StockTransaction) -> Result<(), StoreError> {
        if !self.transactions.contains_key(&txn.id) && !self.state.transactions.contains_key(&txn.id) {
            return Err(StoreError::InvalidArgument(format!(
                "transaction {} does not exist",
                txn.id
            )));
        }
        self.transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx {
            mut state,
            stock,
            ledger,
            transactions,
        } = *self;
        state.stock.extend(stock);
        state.ledger.extend(ledger);
        state.transactions.extend(transactions);
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StockLedgerTx>, StoreError> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            state,
            stock: BTreeMap::new(),
            ledger: Vec::new(),
            transactions: HashMap::new(),
        }))
    }

    async fn stock_quantity(&self, key: &StockKey) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.stock.get(key).copied().unwrap_or(0))
    }

    async fn list_stock(&self, filter: StockFilter) -> Result<Vec<StockLevel>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .stock
            .iter()
            .filter(|(k, _)| filter.warehouse_id.is_none_or(|w| w == k.warehouse_id))
            .filter(|(k, _)| filter.product_id.is_none_or(|p| p == k.product_id))
            .map(|(k, q)| StockLevel {
                key: *k,
                quantity: *q,
            })
            .collect())
    }

    async fn ledger_entries(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        let state = self.state.lock().await;
        let matching: Vec<&LedgerEntry> = state.ledger.iter().filter(|e| filter.matches(e)).collect();
        let total = matching.len() as u64;
        let items = pagination.apply(matching.into_iter().cloned());
        Ok(Page::new(items, total, pagination))
    }

    async fn insert_transaction(&self, txn: &StockTransaction) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.transactions.contains_key(&txn.id) {
            return Err(StoreError::Duplicate(format!("transaction {}", txn.id)));
        }
        state.transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<StockTransaction>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&StockTransaction> = state
            .transactions
            .values()
            .filter(|t| filter.status.is_none_or(|s| s == t.status))
            .filter(|t| filter.transaction_type.is_none_or(|ty| ty == t.transaction_type()))
            .collect();
        matching.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        let total = matching.len() as u64;
        let items = pagination.apply(matching.into_iter().cloned());
        Ok(Page::new(items, total, pagination))
    }
}

#[async_trait]
impl CatalogStore for InMemoryInventoryStore {
    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.locations.values().any(|l| l.name == location.name) {
            return Err(StoreError::Duplicate(format!(
                "location {} already exists",
                location.name
            )));
        }
        state.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.state.lock().await.locations.get(&id).cloned())
    }

    async fn list_locations(&self, pagination: Pagination) -> Result<Page<Location>, StoreError> {
        let state = self.state.lock().await;
        let mut all: Vec<&Location> = state.locations.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        let total = all.len() as u64;
        Ok(Page::new(pagination.apply(all.into_iter().cloned()), total, pagination))
    }

    async fn delete_location(&self, id: LocationId) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !state.locations.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state.warehouses.values().any(|w| w.location_id == Some(id)) {
            return Ok(DeleteOutcome::InUse);
        }
        state.locations.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::Duplicate(format!("sku {} already exists", product.sku)));
        }
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductSummary>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Product> =
            state.products.values().filter(|p| filter.matches(p)).collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        let total = matching.len() as u64;
        let items = pagination
            .apply(matching)
            .into_iter()
            .map(|p| ProductSummary {
                product: p.clone(),
                total_stock: state.total_stock(p.id),
            })
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn delete_product(&self, id: ProductId) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state.product_in_use(id) {
            return Ok(DeleteOutcome::InUse);
        }
        state.stock.retain(|k, _| k.product_id != id);
        state.products.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.warehouses.values().any(|w| w.short_code == warehouse.short_code) {
            return Err(StoreError::Duplicate(format!(
                "short code {} already exists",
                warehouse.short_code
            )));
        }
        state.warehouses.insert(warehouse.id, warehouse.clone());
        Ok(())
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        Ok(self.state.lock().await.warehouses.get(&id).cloned())
    }

    async fn list_warehouses(&self, pagination: Pagination) -> Result<Page<Warehouse>, StoreError> {
        let state = self.state.lock().await;
        let mut all: Vec<&Warehouse> = state.warehouses.values().collect();
        all.sort_by(|a, b| a.short_code.cmp(&b.short_code));
        let total = all.len() as u64;
        Ok(Page::new(pagination.apply(all.into_iter().cloned()), total, pagination))
    }

    async fn delete_warehouse(&self, id: WarehouseId) -> Result<DeleteOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if !state.warehouses.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }
        if state.warehouse_in_use(id) {
            return Ok(DeleteOutcome::InUse);
        }
        state.stock.retain(|k, _| k.warehouse_id != id);
        state.warehouses.remove(&id);
        Ok(DeleteOutcome::Deleted)
    }
}
