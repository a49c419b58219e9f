use chrono::{DateTime, Utc};

use stockledger_core::{ProductId, WarehouseId};

use crate::transaction::{ItemDraft, NewTransaction, TransactionKind};

/// Quantity to order so that stock reaches twice the reorder threshold.
/// Always at least one unit.
pub fn suggested_reorder_quantity(min_stock: i64, current: i64) -> i64 {
    min_stock.saturating_mul(2).saturating_sub(current).max(1)
}

/// An IN draft restocking `product_id` into `warehouse_id`.
pub fn reorder_draft(
    product_id: ProductId,
    warehouse_id: WarehouseId,
    quantity: i64,
    now: DateTime<Utc>,
) -> NewTransaction {
    NewTransaction {
        kind: TransactionKind::In { target: warehouse_id },
        reference: Some(format!("REORDER-AUTO-{}", now.timestamp_millis())),
        notes: Some(format!("Automatic reorder of {quantity} units")),
        items: vec![ItemDraft { product_id, quantity }],
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn suggests_top_up_to_twice_minimum() {
        assert_eq!(suggested_reorder_quantity(10, 4), 16);
        assert_eq!(suggested_reorder_quantity(10, 20), 1);
        assert_eq!(suggested_reorder_quantity(0, 0), 1);
    }

    #[test]
    fn draft_targets_the_warehouse() {
        let p = ProductId::new();
        let w = WarehouseId::new();
        let now = Utc::now();
        let draft = reorder_draft(p, w, 12, now);
        assert_eq!(draft.kind, TransactionKind::In { target: w });
        assert_eq!(draft.items, vec![ItemDraft { product_id: p, quantity: 12 }]);
        assert_eq!(
            draft.reference.as_deref(),
            Some(format!("REORDER-AUTO-{}", now.timestamp_millis()).as_str())
        );
    }

    proptest! {
        #[test]
        fn suggestion_is_always_positive(min in 0i64..1_000_000, current in 0i64..1_000_000) {
            let q = suggested_reorder_quantity(min, current);
            prop_assert!(q >= 1);
            if current < min * 2 {
                prop_assert_eq!(current + q, min * 2);
            }
        }
    }
}
