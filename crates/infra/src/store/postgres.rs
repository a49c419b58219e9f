//! Postgres-backed store.
//!
//! Stock balances, transactions and the ledger live in the tables created by
//! `migrations/0001_stock_ledger.sql`. Concurrency relies on row locks rather
//! than serializable isolation:
//!
//! - the transaction row is loaded with `SELECT … FOR UPDATE`, so two
//!   validations of the same transaction queue up and the second one sees
//!   the first one's status
//! - a decrement is a single conditional `UPDATE … WHERE quantity >= $n`, so
//!   the check and the write cannot be split by another writer
//! - an increment is an upsert on the stock key constraint
//!
//! ## Error Mapping
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |---|---|---|
//! | `40001`, `40P01` | `Conflict` | serialization failure, deadlock |
//! | `55P03`, `57014` | `Timeout` | `lock_timeout` expired, statement cancelled |
//! | `23505` | `Duplicate` | sku, short code or location name already taken |
//! | `23503` | `MissingReference` | product, warehouse or location vanished |
//! | `23514` | `InvalidArgument` | check constraint (negative quantity …) |
//! | anything else | `Backend` | |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use stockledger_core::{
    LedgerEntryId, LocationId, ProductId, SubLocationId, TransactionId, UserId, WarehouseId,
};
use stockledger_inventory::{
    AdjustmentDirection, LedgerEntry, LedgerFilter, Location, NewLedgerEntry, Product,
    ProductSummary, StockKey, StockLevel, StockTransaction, TransactionItem, TransactionKind,
    TransactionStatus, TransactionType, Warehouse, WarehouseKind,
};

use super::query::{Page, Pagination, ProductFilter, StockFilter, TransactionFilter};
use super::r#trait::{CatalogStore, Decrement, DeleteOutcome, InventoryStore, StockLedgerTx};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_stock_ledger.sql");

const TRANSACTION_COLUMNS: &str = "id, transaction_type, status, source_warehouse_id, \
     target_warehouse_id, adjustment_type, reference, notes, created_by, date, updated_at";

/// Postgres implementation of [`InventoryStore`] and [`CatalogStore`].
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: Duration::from_millis(2000),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Upper bound on how long an atomic scope waits for any row lock.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

struct PgStockLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockLedgerTx for PgStockLedgerTx {
    #[instrument(skip(self), fields(transaction_id = %id), err)]
    async fn transaction_for_update(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<StockTransaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("transaction_for_update", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = load_items(&mut *self.tx, &[*id.as_uuid()]).await?;
        let items = items.remove(id.as_uuid()).unwrap_or_default();
        decode_transaction(&row, items).map(Some)
    }

    async fn quantity(&mut self, key: &StockKey) -> Result<i64, StoreError> {
        read_quantity(&mut *self.tx, key).await
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn increment(&mut self, key: &StockKey, amount: i64) -> Result<i64, StoreError> {
        ensure_positive(amount)?;
        let row = sqlx::query(
            r#"
            INSERT INTO stock (warehouse_id, product_id, sub_location_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT stock_key
            DO UPDATE SET quantity = stock.quantity + EXCLUDED.quantity
            RETURNING quantity
            "#,
        )
        .bind(*key.warehouse_id.as_uuid())
        .bind(*key.product_id.as_uuid())
        .bind(key.sub_location_id.map(|s| *s.as_uuid()))
        .bind(amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("increment", e))?;

        get(&row, "quantity")
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn decrement(&mut self, key: &StockKey, amount: i64) -> Result<Decrement, StoreError> {
        ensure_positive(amount)?;
        let row = sqlx::query(
            r#"
            UPDATE stock
            SET quantity = quantity - $4
            WHERE warehouse_id = $1
              AND product_id = $2
              AND sub_location_id IS NOT DISTINCT FROM $3
              AND quantity >= $4
            RETURNING quantity
            "#,
        )
        .bind(*key.warehouse_id.as_uuid())
        .bind(*key.product_id.as_uuid())
        .bind(key.sub_location_id.map(|s| *s.as_uuid()))
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("decrement", e))?;

        match row {
            Some(row) => Ok(Decrement::Applied(get(&row, "quantity")?)),
            None => {
                let available = read_quantity(&mut *self.tx, key).await?;
                debug!(available, requested = amount, "decrement refused");
                Ok(Decrement::Insufficient { available })
            }
        }
    }

    async fn append_ledger(&mut self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let id = LedgerEntryId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO stock_ledger (
                id, transaction_id, product_id, warehouse_id, sub_location_id,
                quantity_change, balance_after
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sequence, created_at
            "#,
        )
        .bind(*id.as_uuid())
        .bind(*entry.transaction_id.as_uuid())
        .bind(*entry.product_id.as_uuid())
        .bind(*entry.warehouse_id.as_uuid())
        .bind(entry.sub_location_id.map(|s| *s.as_uuid()))
        .bind(entry.quantity_change)
        .bind(entry.balance_after)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_ledger", e))?;

        let sequence: i64 = get(&row, "sequence")?;
        let created_at: DateTime<Utc> = get(&row, "created_at")?;
        Ok(entry.into_entry(id, sequence as u64, created_at))
    }

    #[instrument(skip(self, txn), fields(transaction_id = %txn.id, status = txn.status.as_str()), err)]
    async fn save_transaction(&mut self, txn: &StockTransaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE stock_transactions
            SET status = $2, reference = $3, notes = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*txn.id.as_uuid())
        .bind(txn.status.as_str())
        .bind(&txn.reference)
        .bind(&txn.notes)
        .bind(txn.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_transaction", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidArgument(format!(
                "transaction {} does not exist",
                txn.id
            )));
        }

        sqlx::query("DELETE FROM stock_transaction_items WHERE transaction_id = $1")
            .bind(*txn.id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("save_transaction_items", e))?;
        insert_items(&mut self.tx, txn).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StockLedgerTx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PgStockLedgerTx { tx }))
    }

    async fn stock_quantity(&self, key: &StockKey) -> Result<i64, StoreError> {
        read_quantity(&self.pool, key).await
    }

    #[instrument(skip(self), err)]
    async fn list_stock(&self, filter: StockFilter) -> Result<Vec<StockLevel>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT warehouse_id, product_id, sub_location_id, quantity
            FROM stock
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
            ORDER BY warehouse_id, product_id, sub_location_id NULLS FIRST
            "#,
        )
        .bind(filter.warehouse_id.map(|w| *w.as_uuid()))
        .bind(filter.product_id.map(|p| *p.as_uuid()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stock", e))?;

        rows.iter()
            .map(|row| {
                Ok(StockLevel {
                    key: StockKey {
                        warehouse_id: WarehouseId::from_uuid(get(row, "warehouse_id")?),
                        product_id: ProductId::from_uuid(get(row, "product_id")?),
                        sub_location_id: get::<Option<Uuid>>(row, "sub_location_id")?
                            .map(SubLocationId::from_uuid),
                    },
                    quantity: get(row, "quantity")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn ledger_entries(
        &self,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> Result<Page<LedgerEntry>, StoreError> {
        const WHERE: &str = "($1::uuid IS NULL OR transaction_id = $1) \
             AND ($2::uuid IS NULL OR product_id = $2) \
             AND ($3::uuid IS NULL OR warehouse_id = $3)";
        let transaction_id = filter.transaction_id.map(|t| *t.as_uuid());
        let product_id = filter.product_id.map(|p| *p.as_uuid());
        let warehouse_id = filter.warehouse_id.map(|w| *w.as_uuid());

        let total_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM stock_ledger WHERE {WHERE}"
        ))
        .bind(transaction_id)
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_ledger", e))?;
        let total: i64 = get(&total_row, "total")?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT id, sequence, transaction_id, product_id, warehouse_id, sub_location_id,
                   quantity_change, balance_after, created_at
            FROM stock_ledger
            WHERE {WHERE}
            ORDER BY sequence ASC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(transaction_id)
        .bind(product_id)
        .bind(warehouse_id)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_entries", e))?;

        let items = rows
            .iter()
            .map(decode_ledger_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self, txn), fields(transaction_id = %txn.id), err)]
    async fn insert_transaction(&self, txn: &StockTransaction) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(&format!(
            "INSERT INTO stock_transactions ({TRANSACTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(*txn.id.as_uuid())
        .bind(txn.transaction_type().as_str())
        .bind(txn.status.as_str())
        .bind(txn.kind.source_warehouse().map(|w| *w.as_uuid()))
        .bind(txn.kind.target_warehouse().map(|w| *w.as_uuid()))
        .bind(txn.kind.adjustment_direction().map(|d| d.as_str()))
        .bind(&txn.reference)
        .bind(&txn.notes)
        .bind(txn.created_by.map(|u| *u.as_uuid()))
        .bind(txn.date)
        .bind(txn.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        insert_items(&mut tx, txn).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = load_items(&self.pool, &[*id.as_uuid()]).await?;
        decode_transaction(&row, items.remove(id.as_uuid()).unwrap_or_default()).map(Some)
    }

    #[instrument(skip(self), err)]
    async fn list_transactions(
        &self,
        filter: TransactionFilter,
        pagination: Pagination,
    ) -> Result<Page<StockTransaction>, StoreError> {
        const WHERE: &str =
            "($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR transaction_type = $2)";
        let status = filter.status.map(|s| s.as_str());
        let ty = filter.transaction_type.map(|t| t.as_str());

        let total_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM stock_transactions WHERE {WHERE}"
        ))
        .bind(status)
        .bind(ty)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transactions", e))?;
        let total: i64 = get(&total_row, "total")?;

        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE {WHERE} \
             ORDER BY date DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(ty)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        let ids = rows
            .iter()
            .map(|row| get::<Uuid>(row, "id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut items = load_items(&self.pool, &ids).await?;

        let transactions = rows
            .iter()
            .zip(&ids)
            .map(|(row, id)| decode_transaction(row, items.remove(id).unwrap_or_default()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(transactions, total as u64, pagination))
    }
}

#[async_trait]
impl CatalogStore for PostgresInventoryStore {
    async fn insert_location(&self, location: &Location) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO locations (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(*location.id.as_uuid())
            .bind(&location.name)
            .bind(location.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_location", e))?;
        Ok(())
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM locations WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_location", e))?;

        row.as_ref().map(decode_location).transpose()
    }

    async fn list_locations(&self, pagination: Pagination) -> Result<Page<Location>, StoreError> {
        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM locations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_locations", e))?;
        let total: i64 = get(&total_row, "total")?;

        let rows = sqlx::query(
            "SELECT id, name, created_at FROM locations ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_locations", e))?;

        let items = rows.iter().map(decode_location).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self), fields(location_id = %id), err)]
    async fn delete_location(&self, id: LocationId) -> Result<DeleteOutcome, StoreError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM locations l
            WHERE l.id = $1
              AND NOT EXISTS (SELECT 1 FROM warehouses w WHERE w.location_id = l.id)
            "#,
        )
        .bind(*id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_location", e))?
        .rows_affected();

        if deleted == 1 {
            return Ok(DeleteOutcome::Deleted);
        }

        let exists = sqlx::query("SELECT 1 AS one FROM locations WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("location_exists", e))?
            .is_some();
        Ok(if exists {
            DeleteOutcome::InUse
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category, unit_of_measure, min_stock, price, active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.unit_of_measure)
        .bind(product.min_stock)
        .bind(product.price)
        .bind(product.active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, sku, name, category, unit_of_measure, min_stock, price, active, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(decode_product).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductSummary>, StoreError> {
        const WHERE: &str = "($1::text IS NULL OR p.name ILIKE $1 OR p.sku ILIKE $1) \
             AND ($2::text IS NULL OR p.category = $2) \
             AND (NOT $3::boolean OR p.active)";
        let pattern = filter.search.as_deref().map(like_pattern);

        let total_row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM products p WHERE {WHERE}"
        ))
        .bind(&pattern)
        .bind(&filter.category)
        .bind(filter.active_only)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_products", e))?;
        let total: i64 = get(&total_row, "total")?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT p.id, p.sku, p.name, p.category, p.unit_of_measure, p.min_stock, p.price,
                   p.active, p.created_at,
                   COALESCE((SELECT SUM(s.quantity) FROM stock s WHERE s.product_id = p.id), 0)::BIGINT
                       AS total_stock
            FROM products p
            WHERE {WHERE}
            ORDER BY p.name, p.id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&pattern)
        .bind(&filter.category)
        .bind(filter.active_only)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let items = rows
            .iter()
            .map(|row| {
                Ok(ProductSummary {
                    product: decode_product(row)?,
                    total_stock: get(row, "total_stock")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<DeleteOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("DELETE FROM stock WHERE product_id = $1 AND quantity = 0")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_empty_stock", e))?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM products p
            WHERE p.id = $1
              AND NOT EXISTS (SELECT 1 FROM stock_transaction_items i WHERE i.product_id = p.id)
              AND NOT EXISTS (SELECT 1 FROM stock s WHERE s.product_id = p.id)
            "#,
        )
        .bind(*id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_product", e))?
        .rows_affected();

        if deleted == 1 {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            return Ok(DeleteOutcome::Deleted);
        }

        let exists = sqlx::query("SELECT 1 AS one FROM products WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("product_exists", e))?
            .is_some();
        Ok(if exists {
            DeleteOutcome::InUse
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn insert_warehouse(&self, warehouse: &Warehouse) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO warehouses (id, name, short_code, location_id, kind, capacity, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(&warehouse.short_code)
        .bind(warehouse.location_id.map(|l| *l.as_uuid()))
        .bind(warehouse.kind.as_str())
        .bind(warehouse.capacity)
        .bind(warehouse.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        Ok(())
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, short_code, location_id, kind, capacity, created_at
            FROM warehouses
            WHERE id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_warehouse", e))?;

        row.as_ref().map(decode_warehouse).transpose()
    }

    async fn list_warehouses(&self, pagination: Pagination) -> Result<Page<Warehouse>, StoreError> {
        let total_row = sqlx::query("SELECT COUNT(*) AS total FROM warehouses")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_warehouses", e))?;
        let total: i64 = get(&total_row, "total")?;

        let rows = sqlx::query(
            r#"
            SELECT id, name, short_code, location_id, kind, capacity, created_at
            FROM warehouses
            ORDER BY short_code
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_warehouses", e))?;

        let items = rows.iter().map(decode_warehouse).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total as u64, pagination))
    }

    #[instrument(skip(self), fields(warehouse_id = %id), err)]
    async fn delete_warehouse(&self, id: WarehouseId) -> Result<DeleteOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("DELETE FROM stock WHERE warehouse_id = $1 AND quantity = 0")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_empty_stock", e))?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM warehouses w
            WHERE w.id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM stock_transactions t
                  WHERE t.source_warehouse_id = w.id OR t.target_warehouse_id = w.id
              )
              AND NOT EXISTS (SELECT 1 FROM stock s WHERE s.warehouse_id = w.id)
            "#,
        )
        .bind(*id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_warehouse", e))?
        .rows_affected();

        if deleted == 1 {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            return Ok(DeleteOutcome::Deleted);
        }

        let exists = sqlx::query("SELECT 1 AS one FROM warehouses WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("warehouse_exists", e))?
            .is_some();
        Ok(if exists {
            DeleteOutcome::InUse
        } else {
            DeleteOutcome::NotFound
        })
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

async fn read_quantity<'e, E>(executor: E, key: &StockKey) -> Result<i64, StoreError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT quantity FROM stock
        WHERE warehouse_id = $1 AND product_id = $2 AND sub_location_id IS NOT DISTINCT FROM $3
        "#,
    )
    .bind(*key.warehouse_id.as_uuid())
    .bind(*key.product_id.as_uuid())
    .bind(key.sub_location_id.map(|s| *s.as_uuid()))
    .fetch_optional(executor)
    .await
    .map_err(|e| map_sqlx_error("read_quantity", e))?;

    row.map(|r| get(&r, "quantity")).transpose().map(|q| q.unwrap_or(0))
}

async fn load_items<'e, E>(
    executor: E,
    transaction_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<TransactionItem>>, StoreError>
where
    E: PgExecutor<'e>,
{
    let mut items: HashMap<Uuid, Vec<TransactionItem>> = HashMap::new();
    if transaction_ids.is_empty() {
        return Ok(items);
    }

    let rows = sqlx::query(
        r#"
        SELECT transaction_id, line_no, product_id, quantity
        FROM stock_transaction_items
        WHERE transaction_id = ANY($1)
        ORDER BY transaction_id, line_no
        "#,
    )
    .bind(transaction_ids)
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("load_items", e))?;

    for row in &rows {
        let transaction_id: Uuid = get(row, "transaction_id")?;
        let line_no: i32 = get(row, "line_no")?;
        items.entry(transaction_id).or_default().push(TransactionItem {
            line_no: line_no as u32,
            product_id: ProductId::from_uuid(get(row, "product_id")?),
            quantity: get(row, "quantity")?,
        });
    }
    Ok(items)
}

async fn insert_items(
    tx: &mut Transaction<'static, Postgres>,
    txn: &StockTransaction,
) -> Result<(), StoreError> {
    for item in &txn.items {
        sqlx::query(
            r#"
            INSERT INTO stock_transaction_items (transaction_id, line_no, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(*txn.id.as_uuid())
        .bind(item.line_no as i32)
        .bind(*item.product_id.as_uuid())
        .bind(item.quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
    }
    Ok(())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn parse_column<T>(value: &str, column: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Backend(format!("unexpected {column} value {value:?}: {e}")))
}

fn decode_transaction(row: &PgRow, items: Vec<TransactionItem>) -> Result<StockTransaction, StoreError> {
    let transaction_type: TransactionType =
        parse_column(&get::<String>(row, "transaction_type")?, "transaction_type")?;
    let status: TransactionStatus = parse_column(&get::<String>(row, "status")?, "status")?;
    let direction = get::<Option<String>>(row, "adjustment_type")?
        .map(|d| parse_column::<AdjustmentDirection>(&d, "adjustment_type"))
        .transpose()?;
    let source = get::<Option<Uuid>>(row, "source_warehouse_id")?.map(WarehouseId::from_uuid);
    let target = get::<Option<Uuid>>(row, "target_warehouse_id")?.map(WarehouseId::from_uuid);

    let kind = TransactionKind::from_parts(transaction_type, source, target, direction)
        .map_err(|e| StoreError::Backend(format!("inconsistent transaction row: {e}")))?;

    Ok(StockTransaction {
        id: TransactionId::from_uuid(get(row, "id")?),
        kind,
        status,
        reference: get(row, "reference")?,
        notes: get(row, "notes")?,
        created_by: get::<Option<Uuid>>(row, "created_by")?.map(UserId::from_uuid),
        date: get(row, "date")?,
        updated_at: get(row, "updated_at")?,
        items,
    })
}

fn decode_ledger_entry(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let sequence: i64 = get(row, "sequence")?;
    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(get(row, "id")?),
        sequence: sequence as u64,
        transaction_id: TransactionId::from_uuid(get(row, "transaction_id")?),
        product_id: ProductId::from_uuid(get(row, "product_id")?),
        warehouse_id: WarehouseId::from_uuid(get(row, "warehouse_id")?),
        sub_location_id: get::<Option<Uuid>>(row, "sub_location_id")?.map(SubLocationId::from_uuid),
        quantity_change: get(row, "quantity_change")?,
        balance_after: get(row, "balance_after")?,
        created_at: get(row, "created_at")?,
    })
}

fn decode_location(row: &PgRow) -> Result<Location, StoreError> {
    Ok(Location {
        id: LocationId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        created_at: get(row, "created_at")?,
    })
}

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        sku: get(row, "sku")?,
        name: get(row, "name")?,
        category: get(row, "category")?,
        unit_of_measure: get(row, "unit_of_measure")?,
        min_stock: get(row, "min_stock")?,
        price: get(row, "price")?,
        active: get(row, "active")?,
        created_at: get(row, "created_at")?,
    })
}

fn decode_warehouse(row: &PgRow) -> Result<Warehouse, StoreError> {
    let kind: WarehouseKind = parse_column(&get::<String>(row, "kind")?, "kind")?;
    Ok(Warehouse {
        id: WarehouseId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        short_code: get(row, "short_code")?,
        location_id: get::<Option<Uuid>>(row, "location_id")?.map(LocationId::from_uuid),
        kind,
        capacity: get(row, "capacity")?,
        created_at: get(row, "created_at")?,
    })
}

/// `%needle%` with the LIKE wildcards inside the needle escaped.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("55P03") | Some("57014") => StoreError::Timeout(msg),
                Some("23505") => StoreError::Duplicate(msg),
                Some("23503") => StoreError::MissingReference(msg),
                Some("23514") => StoreError::InvalidArgument(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool acquire timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    //! Run against a disposable database:
    //! `TEST_DATABASE_URL=postgres://… cargo test -p stockledger-infra -- --ignored`

    use chrono::Utc;

    use stockledger_inventory::{ItemDraft, NewProduct, NewTransaction, NewWarehouse};

    use super::*;

    async fn store() -> PostgresInventoryStore {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let store = PostgresInventoryStore::connect(&url, 4, Duration::from_secs(5))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn seed(store: &PostgresInventoryStore) -> (Product, Warehouse) {
        let suffix = Uuid::now_v7().simple().to_string();
        let product = Product::create(
            ProductId::new(),
            NewProduct {
                sku: format!("SKU-{suffix}"),
                name: "Widget".into(),
                ..NewProduct::default()
            },
            Utc::now(),
        )
        .unwrap();
        let warehouse = Warehouse::create(
            WarehouseId::new(),
            NewWarehouse {
                name: "Main".into(),
                short_code: suffix[suffix.len() - 12..].to_string(),
                location_id: None,
                kind: None,
                capacity: None,
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_product(&product).await.unwrap();
        store.insert_warehouse(&warehouse).await.unwrap();
        (product, warehouse)
    }

    #[tokio::test]
    #[ignore]
    async fn stock_round_trip_and_rollback() {
        let store = store().await;
        let (product, warehouse) = seed(&store).await;
        let key = StockKey::new(warehouse.id, product.id);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.increment(&key, 10).await.unwrap(), 10);
        assert_eq!(tx.decrement(&key, 4).await.unwrap(), Decrement::Applied(6));
        assert_eq!(
            tx.decrement(&key, 7).await.unwrap(),
            Decrement::Insufficient { available: 6 }
        );
        tx.commit().await.unwrap();
        assert_eq!(store.stock_quantity(&key).await.unwrap(), 6);

        let mut tx = store.begin().await.unwrap();
        tx.increment(&key, 100).await.unwrap();
        drop(tx);
        assert_eq!(store.stock_quantity(&key).await.unwrap(), 6);
    }

    #[tokio::test]
    #[ignore]
    async fn transaction_round_trip() {
        let store = store().await;
        let (product, warehouse) = seed(&store).await;

        let txn = StockTransaction::open(
            TransactionId::new(),
            NewTransaction {
                kind: TransactionKind::Adjust {
                    warehouse: warehouse.id,
                    direction: AdjustmentDirection::Remove,
                },
                reference: Some("CYCLE-COUNT".into()),
                notes: None,
                items: vec![ItemDraft { product_id: product.id, quantity: 2 }],
            },
            Some(UserId::new()),
            Utc::now(),
        );
        store.insert_transaction(&txn).await.unwrap();

        let loaded = store.get_transaction(txn.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, txn.kind);
        assert_eq!(loaded.items, txn.items);
        assert_eq!(loaded.created_by, txn.created_by);

        assert_eq!(store.delete_product(product.id).await.unwrap(), DeleteOutcome::InUse);
        assert_eq!(store.delete_warehouse(warehouse.id).await.unwrap(), DeleteOutcome::InUse);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("bolt"), "%bolt%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    #[ignore]
    async fn product_listing_filters_and_sums_stock() {
        let store = store().await;
        let (product, warehouse) = seed(&store).await;
        let key = StockKey::new(warehouse.id, product.id);
        let mut tx = store.begin().await.unwrap();
        tx.increment(&key, 5).await.unwrap();
        tx.increment(&key.at_sub_location(SubLocationId::new()), 2).await.unwrap();
        tx.commit().await.unwrap();

        let filter = ProductFilter {
            search: Some(product.sku.to_lowercase()),
            ..ProductFilter::default()
        };
        let page = store.list_products(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].product.id, product.id);
        assert_eq!(page.items[0].total_stock, 7);
    }

    #[tokio::test]
    #[ignore]
    async fn location_in_use_cannot_be_deleted() {
        let store = store().await;
        let suffix = Uuid::now_v7().simple().to_string();
        let location = Location {
            id: LocationId::new(),
            name: format!("Site {suffix}"),
            created_at: Utc::now(),
        };
        store.insert_location(&location).await.unwrap();
        let warehouse = Warehouse::create(
            WarehouseId::new(),
            NewWarehouse {
                name: "Annex".into(),
                short_code: suffix[suffix.len() - 12..].to_string(),
                location_id: Some(location.id),
                ..NewWarehouse::default()
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_warehouse(&warehouse).await.unwrap();

        assert_eq!(store.delete_location(location.id).await.unwrap(), DeleteOutcome::InUse);
        assert_eq!(store.delete_warehouse(warehouse.id).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete_location(location.id).await.unwrap(), DeleteOutcome::Deleted);
    }

    #[tokio::test]
    #[ignore]
    async fn duplicate_sku_is_reported() {
        let store = store().await;
        let (product, _) = seed(&store).await;
        let clone = Product {
            id: ProductId::new(),
            ..product
        };
        assert!(matches!(
            store.insert_product(&clone).await,
            Err(StoreError::Duplicate(_))
        ));
    }
}
