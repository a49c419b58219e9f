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

use stockledger_core::LocationId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_location).get(list_locations))
        .route("/:id", get(get_location).delete(delete_location))
}

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateLocationRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request_body(e),
    };

    match services.catalog.create_location(body.into()).await {
        Ok(location) => {
            (StatusCode::CREATED, Json(dto::location_to_json(&location))).into_response()
        }
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// GET /locations?limit=..&offset=.., by name.
pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::PageQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return errors::bad_request_body(e),
    };

    match services.catalog.list_locations(query.pagination()).await {
        Ok(page) => Json(dto::page_to_json(&page, dto::location_to_json)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LocationId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("location"),
    };

    match services.catalog.get_location(id).await {
        Ok(location) => Json(dto::location_to_json(&location)).into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}

/// Refused with 400 while a warehouse still points at the location.
pub async fn delete_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: LocationId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("location"),
    };

    match services.catalog.delete_location(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::inventory_error_to_response(e),
    }
}
