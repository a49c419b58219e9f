//! Request bodies, query strings and JSON views.
//!
//! Identifiers and enum tags arrive as strings and are parsed here, so a bad
//! value becomes a field-level validation error instead of a body rejection.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use stockledger_core::ValidationErrors;
use stockledger_infra::ReorderSuggestion;
use stockledger_infra::store::{Page, Pagination, ProductFilter, StockFilter, TransactionFilter};
use stockledger_inventory::{
    ItemDraft, LedgerEntry, LedgerFilter, Location, NewLocation, NewProduct, NewWarehouse,
    Product, ProductSummary, StockLevel, StockTransaction, TransactionDraft, TransactionStatus,
    TransactionType, Warehouse,
};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub source_warehouse_id: Option<String>,
    pub target_warehouse_id: Option<String>,
    pub adjustment_type: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRequest>,
}

impl TransactionRequest {
    /// Parse the wire shape. `forced` overrides whatever `type` the body
    /// carries (the `/transactions/in` style shortcuts).
    pub fn into_draft(self, forced: Option<TransactionType>) -> Result<TransactionDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let transaction_type = match forced {
            Some(ty) => Some(ty),
            None => required(&mut errors, "type", self.transaction_type.as_deref()),
        };
        let source_warehouse_id =
            optional(&mut errors, "sourceWarehouseId", self.source_warehouse_id.as_deref());
        let target_warehouse_id =
            optional(&mut errors, "targetWarehouseId", self.target_warehouse_id.as_deref());
        let adjustment_type = optional(&mut errors, "adjustmentType", self.adjustment_type.as_deref());
        let items = parse_items(self.items, &mut errors);

        match transaction_type {
            Some(transaction_type) if errors.is_empty() => Ok(TransactionDraft {
                transaction_type,
                source_warehouse_id,
                target_warehouse_id,
                adjustment_type,
                reference: self.reference,
                notes: self.notes,
                items,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemsRequest {
    #[serde(default)]
    pub items: Vec<ItemRequest>,
}

impl UpdateItemsRequest {
    pub fn into_items(self) -> Result<Vec<ItemDraft>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let items = parse_items(self.items, &mut errors);
        errors.into_result(items)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

impl StatusRequest {
    pub fn parse(&self) -> Result<TransactionStatus, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let status = required(&mut errors, "status", self.status.as_deref());
        match status {
            Some(status) => Ok(status),
            None => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub price: i64,
    pub active: Option<bool>,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            sku: body.sku,
            name: body.name,
            category: body.category,
            unit_of_measure: body.unit_of_measure,
            min_stock: body.min_stock,
            price: body.price,
            active: body.active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateLocationRequest {
    #[serde(default)]
    pub name: String,
}

impl From<CreateLocationRequest> for NewLocation {
    fn from(body: CreateLocationRequest) -> Self {
        NewLocation { name: body.name }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWarehouseRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_code: String,
    pub location_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub capacity: Option<i64>,
}

impl CreateWarehouseRequest {
    pub fn into_new(self) -> Result<NewWarehouse, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let location_id = optional(&mut errors, "locationId", self.location_id.as_deref());
        let kind = optional(&mut errors, "type", self.kind.as_deref());
        errors.into_result(NewWarehouse {
            name: self.name,
            short_code: self.short_code,
            location_id,
            kind,
            capacity: self.capacity,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query strings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub active_only: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductListQuery {
    pub fn parse(&self) -> Result<(ProductFilter, Pagination), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = ProductFilter {
            search: non_blank(self.search.as_deref()),
            category: non_blank(self.category.as_deref()),
            active_only: optional(&mut errors, "activeOnly", self.active_only.as_deref())
                .unwrap_or(false),
        };
        errors.into_result((filter, Pagination::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TransactionListQuery {
    pub fn parse(&self) -> Result<(TransactionFilter, Pagination), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = TransactionFilter {
            status: optional(&mut errors, "status", self.status.as_deref()),
            transaction_type: optional(&mut errors, "type", self.transaction_type.as_deref()),
        };
        errors.into_result((filter, Pagination::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub transaction_id: Option<String>,
    pub product_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl HistoryQuery {
    pub fn parse(&self) -> Result<(LedgerFilter, Pagination), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = LedgerFilter {
            transaction_id: optional(&mut errors, "transactionId", self.transaction_id.as_deref()),
            product_id: optional(&mut errors, "productId", self.product_id.as_deref()),
            warehouse_id: optional(&mut errors, "warehouseId", self.warehouse_id.as_deref()),
        };
        errors.into_result((filter, Pagination::new(self.limit, self.offset)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuery {
    pub warehouse_id: Option<String>,
    pub product_id: Option<String>,
}

impl StockQuery {
    pub fn parse(&self) -> Result<StockFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = StockFilter {
            warehouse_id: optional(&mut errors, "warehouseId", self.warehouse_id.as_deref()),
            product_id: optional(&mut errors, "productId", self.product_id.as_deref()),
        };
        errors.into_result(filter)
    }
}

fn parse_items(items: Vec<ItemRequest>, errors: &mut ValidationErrors) -> Vec<ItemDraft> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let product_id = required(
                errors,
                &format!("items[{idx}].productId"),
                item.product_id.as_deref(),
            );
            if item.quantity.is_none() {
                errors.add(format!("items[{idx}].quantity"), "quantity is required");
            }
            Some(ItemDraft {
                product_id: product_id?,
                quantity: item.quantity?,
            })
        })
        .collect()
}

/// Parse a present, non-blank value; record a field error otherwise.
fn required<T: FromStr>(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<T> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        Some(_) => optional(errors, field, raw),
        None => {
            errors.add(field, format!("{field} is required"));
            None
        }
    }
}

/// Blank means absent; anything else must parse.
fn optional<T: FromStr>(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, format!("{field} has an invalid value: {raw}"));
            None
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub fn transaction_to_json(txn: &StockTransaction) -> Value {
    json!({
        "id": txn.id.to_string(),
        "type": txn.transaction_type().as_str(),
        "status": txn.status.as_str(),
        "sourceWarehouseId": txn.kind.source_warehouse().map(|id| id.to_string()),
        "targetWarehouseId": txn.kind.target_warehouse().map(|id| id.to_string()),
        "adjustmentType": txn.kind.adjustment_direction().map(|d| d.as_str()),
        "reference": txn.reference,
        "notes": txn.notes,
        "createdBy": txn.created_by.map(|id| id.to_string()),
        "date": timestamp(txn.date),
        "updatedAt": timestamp(txn.updated_at),
        "items": txn.items.iter().map(|item| json!({
            "lineNo": item.line_no,
            "productId": item.product_id.to_string(),
            "quantity": item.quantity,
        })).collect::<Vec<_>>(),
    })
}

pub fn ledger_entry_to_json(entry: &LedgerEntry) -> Value {
    json!({
        "id": entry.id.to_string(),
        "sequence": entry.sequence,
        "transactionId": entry.transaction_id.to_string(),
        "productId": entry.product_id.to_string(),
        "warehouseId": entry.warehouse_id.to_string(),
        "subLocationId": entry.sub_location_id.map(|id| id.to_string()),
        "quantityChange": entry.quantity_change,
        "balanceAfter": entry.balance_after,
        "createdAt": timestamp(entry.created_at),
    })
}

pub fn location_to_json(location: &Location) -> Value {
    json!({
        "id": location.id.to_string(),
        "name": location.name,
        "createdAt": timestamp(location.created_at),
    })
}

/// `totalStock` sums every stock row of the product.
pub fn product_to_json(product: &Product, total_stock: i64) -> Value {
    json!({
        "id": product.id.to_string(),
        "sku": product.sku,
        "name": product.name,
        "category": product.category,
        "unitOfMeasure": product.unit_of_measure,
        "minStock": product.min_stock,
        "price": product.price,
        "active": product.active,
        "totalStock": total_stock,
        "createdAt": timestamp(product.created_at),
    })
}

pub fn product_summary_to_json(summary: &ProductSummary) -> Value {
    product_to_json(&summary.product, summary.total_stock)
}

pub fn warehouse_to_json(warehouse: &Warehouse) -> Value {
    json!({
        "id": warehouse.id.to_string(),
        "name": warehouse.name,
        "shortCode": warehouse.short_code,
        "locationId": warehouse.location_id.map(|id| id.to_string()),
        "type": warehouse.kind.as_str(),
        "capacity": warehouse.capacity,
        "createdAt": timestamp(warehouse.created_at),
    })
}

pub fn stock_level_to_json(level: &StockLevel) -> Value {
    json!({
        "warehouseId": level.key.warehouse_id.to_string(),
        "productId": level.key.product_id.to_string(),
        "subLocationId": level.key.sub_location_id.map(|id| id.to_string()),
        "quantity": level.quantity,
    })
}

pub fn reorder_to_json(reorder: &ReorderSuggestion) -> Value {
    json!({
        "currentQuantity": reorder.current_quantity,
        "suggestedQuantity": reorder.suggested_quantity,
        "transaction": transaction_to_json(&reorder.transaction),
    })
}

pub fn page_to_json<T>(page: &Page<T>, item: impl Fn(&T) -> Value) -> Value {
    json!({
        "items": page.items.iter().map(item).collect::<Vec<_>>(),
        "total": page.total,
        "limit": page.pagination.limit,
        "offset": page.pagination.offset,
        "hasMore": page.has_more,
    })
}
