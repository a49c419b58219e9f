use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stock::StockKey;
use crate::transaction::{StockTransaction, TransactionItem, TransactionKind};

/// One signed change to one stock balance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub delta: i64,
}

impl StockMovement {
    pub fn is_decrement(&self) -> bool {
        self.delta < 0
    }

    /// Absolute size of the movement.
    pub fn magnitude(&self) -> i64 {
        self.delta.abs()
    }
}

impl TransactionKind {
    /// Movements caused by one item, in application order.
    ///
    /// A TRANSFER takes stock out of the source before it lands in the target.
    pub fn movements_for(&self, item: &TransactionItem) -> Vec<StockMovement> {
        let q = item.quantity;
        let at = |warehouse_id| StockKey::new(warehouse_id, item.product_id);
        match *self {
            TransactionKind::In { target } => vec![StockMovement { key: at(target), delta: q }],
            TransactionKind::Out { source } => vec![StockMovement { key: at(source), delta: -q }],
            TransactionKind::Transfer { source, target } => vec![
                StockMovement { key: at(source), delta: -q },
                StockMovement { key: at(target), delta: q },
            ],
            TransactionKind::Adjust { warehouse, direction } => vec![StockMovement {
                key: at(warehouse),
                delta: direction.apply(q),
            }],
        }
    }
}

impl StockTransaction {
    /// All movements of the transaction: items in list order, each item's
    /// movements in order.
    pub fn planned_movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .flat_map(|item| self.kind.movements_for(item))
            .collect()
    }
}

/// Net change per key across a set of movements. Keys that net to zero are
/// kept.
pub fn net_deltas<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> BTreeMap<StockKey, i64> {
    let mut net = BTreeMap::new();
    for m in movements {
        *net.entry(m.key).or_insert(0) += m.delta;
    }
    net
}
