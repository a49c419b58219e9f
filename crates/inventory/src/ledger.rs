use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerEntryId, ProductId, SubLocationId, TransactionId, WarehouseId};

use crate::movement::StockMovement;

/// Immutable record of one applied stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    /// Append order; strictly increasing across the whole ledger.
    pub sequence: u64,
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub sub_location_id: Option<SubLocationId>,
    pub quantity_change: i64,
    /// Stock under the entry's key right after the movement was applied.
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// A ledger row that has not been appended yet. The store assigns id,
/// sequence and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub sub_location_id: Option<SubLocationId>,
    pub quantity_change: i64,
    pub balance_after: i64,
}

impl NewLedgerEntry {
    pub fn for_movement(
        transaction_id: TransactionId,
        movement: &StockMovement,
        balance_after: i64,
    ) -> Self {
        Self {
            transaction_id,
            product_id: movement.key.product_id,
            warehouse_id: movement.key.warehouse_id,
            sub_location_id: movement.key.sub_location_id,
            quantity_change: movement.delta,
            balance_after,
        }
    }

    pub fn into_entry(self, id: LedgerEntryId, sequence: u64, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            sequence,
            transaction_id: self.transaction_id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            sub_location_id: self.sub_location_id,
            quantity_change: self.quantity_change,
            balance_after: self.balance_after,
            created_at,
        }
    }
}

/// Ledger read filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub transaction_id: Option<TransactionId>,
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.transaction_id.is_none_or(|id| id == entry.transaction_id)
            && self.product_id.is_none_or(|id| id == entry.product_id)
            && self.warehouse_id.is_none_or(|id| id == entry.warehouse_id)
    }
}
