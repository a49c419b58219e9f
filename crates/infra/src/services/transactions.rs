use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockledger_core::{ProductId, TransactionId, UserId, ValidationErrors, WarehouseId};
use stockledger_inventory::transaction::validate_items;
use stockledger_inventory::{
    ItemDraft, LedgerEntry, LedgerFilter, NewTransaction, StockKey, StockLevel, StockTransaction,
    TransactionDraft, TransactionStatus, reorder_draft, suggested_reorder_quantity,
};

use crate::engine::TransitionEngine;
use crate::error::{InventoryError, InventoryResult};
use crate::store::{CatalogStore, InventoryStore, Page, Pagination, StockFilter, TransactionFilter};

/// Outcome of an automatic reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderSuggestion {
    pub current_quantity: i64,
    pub suggested_quantity: i64,
    pub transaction: StockTransaction,
}

/// Use cases around stock transactions and their ledger.
#[derive(Clone)]
pub struct TransactionService {
    store: Arc<dyn InventoryStore>,
    catalog: Arc<dyn CatalogStore>,
    engine: TransitionEngine,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        catalog: Arc<dyn CatalogStore>,
        engine: TransitionEngine,
    ) -> Self {
        Self {
            store,
            catalog,
            engine,
        }
    }

    /// Validate the draft and store it as a DRAFT transaction. No stock effect.
    #[instrument(skip(self, draft), fields(transaction_type = draft.transaction_type.as_str()))]
    pub async fn create(
        &self,
        draft: TransactionDraft,
        created_by: Option<UserId>,
    ) -> InventoryResult<StockTransaction> {
        let input = draft.validate()?;
        self.open(input, created_by).await
    }

    async fn open(
        &self,
        input: NewTransaction,
        created_by: Option<UserId>,
    ) -> InventoryResult<StockTransaction> {
        for warehouse_id in input.kind.warehouses() {
            self.ensure_warehouse(warehouse_id).await?;
        }
        self.ensure_products(&input.items).await?;

        let txn = StockTransaction::open(TransactionId::new(), input, created_by, Utc::now());
        self.store.insert_transaction(&txn).await?;
        info!(transaction_id = %txn.id, "transaction drafted");
        Ok(txn)
    }

    pub async fn get(&self, id: TransactionId) -> InventoryResult<StockTransaction> {
        self.store
            .get_transaction(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("transaction", id))
    }

    pub async fn list(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> InventoryResult<Page<StockTransaction>> {
        Ok(self.store.list_transactions(filter, pagination).await?)
    }

    /// Replace the item list of a DRAFT transaction.
    #[instrument(skip(self, items), fields(transaction_id = %id, items = items.len()))]
    pub async fn update_items(
        &self,
        id: TransactionId,
        items: Vec<ItemDraft>,
    ) -> InventoryResult<StockTransaction> {
        let mut errors = ValidationErrors::new();
        validate_items(&items, &mut errors);
        if !errors.is_empty() {
            return Err(errors.into());
        }
        self.ensure_products(&items).await?;

        let mut scope = self.store.begin().await?;
        let mut txn = scope
            .transaction_for_update(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("transaction", id))?;
        txn.replace_items(items, Utc::now())?;
        scope.save_transaction(&txn).await?;
        scope.commit().await?;
        Ok(txn)
    }

    /// Only cancellation is a plain status change; completion goes through
    /// [`validate`](Self::validate).
    #[instrument(skip(self), fields(transaction_id = %id, status = status.as_str()))]
    pub async fn change_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> InventoryResult<StockTransaction> {
        match status {
            TransactionStatus::Cancelled => {}
            TransactionStatus::Completed => {
                return Err(ValidationErrors::single(
                    "status",
                    "Use validate endpoint for completion",
                )
                .into());
            }
            TransactionStatus::Draft => {
                return Err(ValidationErrors::single(
                    "status",
                    "a transaction cannot be moved back to DRAFT",
                )
                .into());
            }
        }

        let mut scope = self.store.begin().await?;
        let mut txn = scope
            .transaction_for_update(id)
            .await?
            .ok_or_else(|| InventoryError::not_found("transaction", id))?;
        txn.cancel(Utc::now())?;
        scope.save_transaction(&txn).await?;
        scope.commit().await?;
        info!("transaction cancelled");
        Ok(txn)
    }

    pub async fn validate(&self, id: TransactionId) -> InventoryResult<StockTransaction> {
        self.engine.validate(id).await
    }

    pub async fn history(
        &self,
        filter: LedgerFilter,
        pagination: Pagination,
    ) -> InventoryResult<Page<LedgerEntry>> {
        Ok(self.store.ledger_entries(&filter, pagination).await?)
    }

    pub async fn stock_levels(&self, filter: StockFilter) -> InventoryResult<Vec<StockLevel>> {
        Ok(self.store.list_stock(filter).await?)
    }

    /// Draft an IN transaction that tops the product up to twice its reorder
    /// threshold in the given warehouse.
    #[instrument(skip(self), fields(product_id = %product_id, warehouse_id = %warehouse_id))]
    pub async fn reorder(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        created_by: Option<UserId>,
    ) -> InventoryResult<ReorderSuggestion> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| InventoryError::not_found("product", product_id))?;
        self.ensure_warehouse(warehouse_id).await?;

        let current_quantity = self
            .store
            .stock_quantity(&StockKey::new(warehouse_id, product_id))
            .await?;
        let suggested_quantity = suggested_reorder_quantity(product.min_stock, current_quantity);

        let now = Utc::now();
        let txn = StockTransaction::open(
            TransactionId::new(),
            reorder_draft(product_id, warehouse_id, suggested_quantity, now),
            created_by,
            now,
        );
        self.store.insert_transaction(&txn).await?;
        info!(transaction_id = %txn.id, current_quantity, suggested_quantity, "reorder drafted");

        Ok(ReorderSuggestion {
            current_quantity,
            suggested_quantity,
            transaction: txn,
        })
    }

    async fn ensure_warehouse(&self, id: WarehouseId) -> InventoryResult<()> {
        match self.catalog.get_warehouse(id).await? {
            Some(_) => Ok(()),
            None => Err(InventoryError::not_found("warehouse", id)),
        }
    }

    async fn ensure_products(&self, items: &[ItemDraft]) -> InventoryResult<()> {
        let mut checked: Vec<ProductId> = Vec::with_capacity(items.len());
        for item in items {
            if checked.contains(&item.product_id) {
                continue;
            }
            if self.catalog.get_product(item.product_id).await?.is_none() {
                return Err(InventoryError::not_found("product", item.product_id));
            }
            checked.push(item.product_id);
        }
        Ok(())
    }
}
