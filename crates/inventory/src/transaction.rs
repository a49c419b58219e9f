use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    DomainError, DomainResult, ProductId, TransactionId, UserId, ValidationErrors, WarehouseId,
};

/// Wire-level transaction type tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    In,
    Out,
    Transfer,
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::In => "IN",
            TransactionType::Out => "OUT",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Adjust => "ADJUST",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(TransactionType::In),
            "OUT" => Ok(TransactionType::Out),
            "TRANSFER" => Ok(TransactionType::Transfer),
            "ADJUST" => Ok(TransactionType::Adjust),
            _ => Err(DomainError::validation(
                "type",
                "type must be one of: IN, OUT, TRANSFER, ADJUST",
            )),
        }
    }
}

/// Direction of a stock adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentDirection {
    Add,
    Remove,
}

impl AdjustmentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentDirection::Add => "ADD",
            AdjustmentDirection::Remove => "REMOVE",
        }
    }

    /// Signed delta for a positive magnitude.
    pub fn apply(&self, magnitude: i64) -> i64 {
        match self {
            AdjustmentDirection::Add => magnitude,
            AdjustmentDirection::Remove => -magnitude,
        }
    }
}

impl FromStr for AdjustmentDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Ok(AdjustmentDirection::Add),
            "REMOVE" => Ok(AdjustmentDirection::Remove),
            _ => Err(DomainError::validation(
                "adjustmentType",
                "adjustmentType must be one of: ADD, REMOVE",
            )),
        }
    }
}

/// What a transaction does to stock. Each kind carries only the warehouses it
/// touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Receipt into `target`.
    In { target: WarehouseId },
    /// Delivery out of `source`.
    Out { source: WarehouseId },
    /// Move from `source` to `target`.
    Transfer {
        source: WarehouseId,
        target: WarehouseId,
    },
    /// Count correction at `warehouse`.
    Adjust {
        warehouse: WarehouseId,
        direction: AdjustmentDirection,
    },
}

impl TransactionKind {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            TransactionKind::In { .. } => TransactionType::In,
            TransactionKind::Out { .. } => TransactionType::Out,
            TransactionKind::Transfer { .. } => TransactionType::Transfer,
            TransactionKind::Adjust { .. } => TransactionType::Adjust,
        }
    }

    pub fn source_warehouse(&self) -> Option<WarehouseId> {
        match self {
            TransactionKind::Out { source } | TransactionKind::Transfer { source, .. } => {
                Some(*source)
            }
            TransactionKind::In { .. } | TransactionKind::Adjust { .. } => None,
        }
    }

    /// The receiving warehouse; for adjustments, the adjusted warehouse.
    pub fn target_warehouse(&self) -> Option<WarehouseId> {
        match self {
            TransactionKind::In { target } | TransactionKind::Transfer { target, .. } => {
                Some(*target)
            }
            TransactionKind::Adjust { warehouse, .. } => Some(*warehouse),
            TransactionKind::Out { .. } => None,
        }
    }

    pub fn adjustment_direction(&self) -> Option<AdjustmentDirection> {
        match self {
            TransactionKind::Adjust { direction, .. } => Some(*direction),
            _ => None,
        }
    }

    /// Every warehouse the transaction references, source first.
    pub fn warehouses(&self) -> Vec<WarehouseId> {
        self.source_warehouse()
            .into_iter()
            .chain(self.target_warehouse())
            .collect()
    }

    /// Assemble a kind from its flat wire/storage columns, recording a field
    /// error for each missing or contradictory part.
    pub fn from_parts(
        transaction_type: TransactionType,
        source: Option<WarehouseId>,
        target: Option<WarehouseId>,
        direction: Option<AdjustmentDirection>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let kind = match transaction_type {
            TransactionType::In => target.map(|target| TransactionKind::In { target }),
            TransactionType::Out => source.map(|source| TransactionKind::Out { source }),
            TransactionType::Transfer => match (source, target) {
                (Some(source), Some(target)) if source == target => {
                    errors.add(
                        "targetWarehouseId",
                        "targetWarehouseId must differ from sourceWarehouseId for TRANSFER",
                    );
                    None
                }
                (Some(source), Some(target)) => Some(TransactionKind::Transfer { source, target }),
                _ => None,
            },
            TransactionType::Adjust => match (target, direction) {
                (Some(warehouse), Some(direction)) => {
                    Some(TransactionKind::Adjust { warehouse, direction })
                }
                _ => None,
            },
        };

        let ty = transaction_type.as_str();
        let needs_source = matches!(transaction_type, TransactionType::Out | TransactionType::Transfer);
        let needs_target = !matches!(transaction_type, TransactionType::Out);
        if needs_source && source.is_none() {
            errors.add("sourceWarehouseId", format!("sourceWarehouseId is required for {ty}"));
        }
        if needs_target && target.is_none() {
            errors.add("targetWarehouseId", format!("targetWarehouseId is required for {ty}"));
        }
        if transaction_type == TransactionType::Adjust && direction.is_none() {
            errors.add("adjustmentType", "adjustmentType (ADD/REMOVE) is required for ADJUST");
        }

        match kind {
            Some(kind) if errors.is_empty() => Ok(kind),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Draft,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Draft => "DRAFT",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Draft)
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(TransactionStatus::Draft),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            _ => Err(DomainError::validation(
                "status",
                "status must be one of: DRAFT, COMPLETED, CANCELLED",
            )),
        }
    }
}

/// One line of a transaction. `quantity` is always a positive magnitude; the
/// sign of its stock effect comes from the transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Unvalidated item input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Unvalidated transaction input, shaped like the wire request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub transaction_type: TransactionType,
    pub source_warehouse_id: Option<WarehouseId>,
    pub target_warehouse_id: Option<WarehouseId>,
    pub adjustment_type: Option<AdjustmentDirection>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<ItemDraft>,
}

/// Validated input for opening a DRAFT transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<ItemDraft>,
}

impl TransactionDraft {
    pub fn validate(self) -> Result<NewTransaction, ValidationErrors> {
        let kind = TransactionKind::from_parts(
            self.transaction_type,
            self.source_warehouse_id,
            self.target_warehouse_id,
            self.adjustment_type,
        );

        let mut errors = match &kind {
            Ok(_) => ValidationErrors::new(),
            Err(e) => e.clone(),
        };
        validate_items(&self.items, &mut errors);

        match kind {
            Ok(kind) if errors.is_empty() => Ok(NewTransaction {
                kind,
                reference: non_blank(self.reference),
                notes: non_blank(self.notes),
                items: self.items,
            }),
            _ => Err(errors),
        }
    }
}

/// Largest quantity a single item may carry. Keeps balances far from `i64`
/// overflow however many completed transactions pile onto one key.
pub const MAX_ITEM_QUANTITY: i64 = i32::MAX as i64;

/// Item rules shared by creation and DRAFT item replacement.
pub fn validate_items(items: &[ItemDraft], errors: &mut ValidationErrors) {
    if items.is_empty() {
        errors.add("items", "at least one item is required");
    }
    for (idx, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            errors.add(
                format!("items[{idx}].quantity"),
                "quantity must be a positive integer",
            );
        } else if item.quantity > MAX_ITEM_QUANTITY {
            errors.add(
                format!("items[{idx}].quantity"),
                format!("quantity cannot exceed {MAX_ITEM_QUANTITY}"),
            );
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn number_items(items: Vec<ItemDraft>) -> Vec<TransactionItem> {
    items
        .into_iter()
        .zip(1u32..)
        .map(|(item, line_no)| TransactionItem {
            line_no,
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect()
}

/// A stock-moving document.
///
/// Lifecycle: DRAFT → COMPLETED (through validation only) or DRAFT →
/// CANCELLED. Both targets are terminal; only completion has stock effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<TransactionItem>,
}

impl StockTransaction {
    /// Open a new DRAFT. No stock effect.
    pub fn open(
        id: TransactionId,
        input: NewTransaction,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: input.kind,
            status: TransactionStatus::Draft,
            reference: input.reference,
            notes: input.notes,
            created_by,
            date: now,
            updated_at: now,
            items: number_items(input.items),
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    pub fn ensure_draft(&self) -> DomainResult<()> {
        if self.status != TransactionStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "transaction {} is {}, not DRAFT",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Replace the whole item list of a DRAFT.
    pub fn replace_items(&mut self, items: Vec<ItemDraft>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_draft()?;
        let mut errors = ValidationErrors::new();
        validate_items(&items, &mut errors);
        if !errors.is_empty() {
            return Err(errors.into());
        }
        self.items = number_items(items);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_draft()?;
        self.status = TransactionStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    /// Mark as COMPLETED. Callers apply the stock effects in the same atomic
    /// scope that persists this status.
    pub fn complete(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_draft()?;
        self.status = TransactionStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Distinct products referenced by the items, in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id);
            }
        }
        ids
    }
}
