use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_core::{ProductId, TransactionId, WarehouseId};
use stockledger_inventory::TransactionType;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transaction).get(list_transactions))
        .route("/in", post(create_in))
        .route("/out", post(create_out))
        .route("/transfer", post(create_transfer))
        .route("/adjust", post(create_adjust))
        .route("/history", get(history))
        .route("/reorder/:product_id/:warehouse_id", post(reorder))
        .route("/:id", get(get_transaction).put(update_items))
        .route("/:id/validate", post(validate_transaction))
        .route("/:id/status", post(change_status))
}

// ─────────────────────────────────────────────────────────────────────────────
// Drafting
// ─────────────────────────────────────────────────────────────────────────────

pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    create(&services, actor, body, None).await
}

pub async fn create_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    create(&services, actor, body, Some(TransactionType::In)).await
}

pub async fn create_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    create(&services, actor, body, Some(TransactionType::Out)).await
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    create(&services, actor, body, Some(TransactionType::Transfer)).await
}

pub async fn create_adjust(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    create(&services, actor, body, Some(TransactionType::Adjust)).await
}

async fn create(
    services: &AppServices,
    actor: ActorContext,
    body: Result<Json<dto::TransactionRequest>, JsonRejection>,
    forced: Option<TransactionType>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };
    let draft = match body.into_draft(forced) {
        Ok(d) => d,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.create(draft, actor.user_id()).await {
        Ok(txn) => (StatusCode::CREATED, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// PUT /transactions/:id: replace the items of a DRAFT.
pub async fn update_items(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateItemsRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };
    let items = match body.into_items() {
        Ok(items) => items,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.update_items(id, items).await {
        Ok(txn) => Json(dto::transaction_to_json(&txn)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// POST /transactions/reorder/:productId/:warehouseId
pub async fn reorder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> axum::response::Response {
    let product_id: ProductId = match product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };
    let warehouse_id: WarehouseId = match warehouse_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("warehouse"),
    };

    match services
        .transactions
        .reorder(product_id, warehouse_id, actor.user_id())
        .await
    {
        Ok(reorder) => (StatusCode::CREATED, Json(dto::reorder_to_json(&reorder))).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// POST /transactions/:id/validate: DRAFT to COMPLETED, applying stock.
pub async fn validate_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };

    match services.transactions.validate(id).await {
        Ok(txn) => Json(dto::transaction_to_json(&txn)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// POST /transactions/:id/status with `{"status": "CANCELLED"}`
pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::StatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };
    let status = match body.parse() {
        Ok(s) => s,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.change_status(id, status).await {
        Ok(txn) => Json(dto::transaction_to_json(&txn)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };

    match services.transactions.get(id).await {
        Ok(txn) => Json(dto::transaction_to_json(&txn)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /transactions?status=..&type=..&limit=..&offset=.., newest first.
pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::TransactionListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };
    let (filter, pagination) = match query.parse() {
        Ok(v) => v,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.list(filter, pagination).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::transaction_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /transactions/history?transactionId=..&productId=..&warehouseId=..
pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::HistoryQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };
    let (filter, pagination) = match query.parse() {
        Ok(v) => v,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.history(filter, pagination).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::ledger_entry_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
