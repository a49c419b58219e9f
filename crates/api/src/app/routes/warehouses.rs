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

use stockledger_core::WarehouseId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_warehouse).get(list_warehouses))
        .route("/:id", get(get_warehouse).delete(delete_warehouse))
}

pub async fn create_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateWarehouseRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };
    let input = match body.into_new() {
        Ok(v) => v,
        Err(e) => return errors::validation_error(&e),
    };

    match services.catalog.create_warehouse(input).await {
        Ok(warehouse) => {
            (StatusCode::CREATED, Json(dto::warehouse_to_json(&warehouse))).into_response()
        }
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /warehouses?limit=..&offset=..
pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };

    match services.catalog.list_warehouses(query.pagination()).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::warehouse_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: WarehouseId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("warehouse"),
    };

    match services.catalog.get_warehouse(id).await {
        Ok(warehouse) => Json(dto::warehouse_to_json(&warehouse)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn delete_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: WarehouseId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("warehouse"),
    };

    match services.catalog.delete_warehouse(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
