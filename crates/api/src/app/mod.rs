//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, transfer coordinator and account directory
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request parsing and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router around already-wired services.
pub fn build_app(services: services::AppServices) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .layer(Extension(Arc::new(services))),
        )
}

/// Build the router with the store selected by `config` (public entrypoint used by `main.rs`).
pub async fn build_app_from_config(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(build_app(services))
}
