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

use stockledger_core::ProductId;
use stockledger_infra::store::StockFilter;
use stockledger_infra::InventoryResult;
use stockledger_inventory::{Product, StockLevel};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).delete(delete_product))
        .route("/:id/stock", get(product_stock))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };

    match services.catalog.create_product(body.into()).await {
        Ok(product) => {
            (StatusCode::CREATED, Json(dto::product_to_json(&product, 0))).into_response()
        }
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /products?search=..&category=..&activeOnly=true&limit=..&offset=.., by name.
pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ProductListQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };
    let (filter, pagination) = match query.parse() {
        Ok(v) => v,
        Err(e) => return errors::validation_error(&e),
    };

    match services.catalog.list_products(&filter, pagination).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::product_summary_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// The product and every stock row that holds it.
async fn load_with_stock(
    services: &AppServices,
    id: ProductId,
) -> InventoryResult<(Product, Vec<StockLevel>)> {
    let product = services.catalog.get_product(id).await?;
    let levels = services
        .transactions
        .stock_levels(StockFilter {
            product_id: Some(id),
            ..StockFilter::default()
        })
        .await?;
    Ok((product, levels))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match load_with_stock(&services, id).await {
        Ok((product, levels)) => {
            let total: i64 = levels.iter().map(|l| l.quantity).sum();
            Json(dto::product_to_json(&product, total)).into_response()
        }
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /products/:id/stock: per warehouse and sub-location balances.
pub async fn product_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match load_with_stock(&services, id).await {
        Ok((_, levels)) => Json(serde_json::json!({
            "productId": id.to_string(),
            "totalStock": levels.iter().map(|l| l.quantity).sum::<i64>(),
            "items": levels.iter().map(dto::stock_level_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("product"),
    };

    match services.catalog.delete_product(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
