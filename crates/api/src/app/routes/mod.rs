use axum::{routing::get, Router};

pub mod locations;
pub mod products;
pub mod stock;
pub mod system;
pub mod transactions;
pub mod warehouses;

/// Router for every business endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/transactions", transactions::router())
        .nest("/locations", locations::router())
        .nest("/products", products::router())
        .nest("/warehouses", warehouses::router())
        .route("/stock", get(stock::list_stock))
}
