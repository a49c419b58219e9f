use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, SubLocationId, WarehouseId};

/// Composite key of one stock balance.
///
/// `sub_location_id = None` is the warehouse-level balance; it is a distinct
/// key from every sub-location balance of the same product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub sub_location_id: Option<SubLocationId>,
}

impl StockKey {
    pub fn new(warehouse_id: WarehouseId, product_id: ProductId) -> Self {
        Self {
            warehouse_id,
            product_id,
            sub_location_id: None,
        }
    }

    pub fn at_sub_location(self, sub_location_id: SubLocationId) -> Self {
        Self {
            sub_location_id: Some(sub_location_id),
            ..self
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.sub_location_id {
            Some(sub) => write!(f, "{}/{}@{}", self.warehouse_id, self.product_id, sub),
            None => write!(f, "{}/{}", self.warehouse_id, self.product_id),
        }
    }
}

/// Current quantity held under one key. Never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub key: StockKey,
    pub quantity: i64,
}
