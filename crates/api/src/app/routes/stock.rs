use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::IntoResponse,
    Json,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// GET /stock?warehouseId=..&productId=..
pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::StockQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };
    let filter = match query.parse() {
        Ok(f) => f,
        Err(e) => return errors::validation_error(&e),
    };

    match services.transactions.stock_levels(filter).await {
        Ok(levels) => Json(serde_json::json!({
            "items": levels.iter().map(dto::stock_level_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
