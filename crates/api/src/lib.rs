//! HTTP API: routing, request/response mapping and the actor middleware.

pub mod app;
pub mod context;
pub mod middleware;
