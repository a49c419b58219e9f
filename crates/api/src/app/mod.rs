//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared service bundle
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request parsing and JSON views
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockledger_infra::EngineConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(Arc::new(services)))
                .layer(axum::middleware::from_fn(middleware::actor_middleware)),
        )
}

/// Router over a fresh in-memory store.
pub fn build_in_memory_app(engine: EngineConfig) -> Router {
    build_app(AppServices::in_memory(engine))
}
