use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use stockledger_core::ValidationErrors;
use stockledger_infra::InventoryError;

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    match err {
        InventoryError::Validation(errors) => validation_error(&errors),
        InventoryError::NotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        InventoryError::InvalidState(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_state", msg),
        InventoryError::InsufficientStock {
            product_id,
            warehouse_id,
            requested,
            available,
        } => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!("Insufficient stock for product {product_id}"),
                "productId": product_id.to_string(),
                "warehouseId": warehouse_id.to_string(),
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        InventoryError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        InventoryError::ConcurrencyConflict(msg) => {
            json_error(StatusCode::CONFLICT, "concurrency_conflict", msg)
        }
        InventoryError::Store(e) => {
            error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// 400 with one `{field, message}` detail per rejected field.
pub fn validation_error(errors: &ValidationErrors) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "message": errors.to_string(),
            "details": errors.fields(),
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed JSON body or query string.
pub fn bad_request_body(rejection: impl std::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.to_string())
}

pub fn invalid_id(entity: &str) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_id",
        format!("invalid {entity} id"),
    )
}
