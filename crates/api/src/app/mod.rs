//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the shared `RecordService`
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockroom_infra::{AppConfig, StoreError};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router from configuration (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> Result<Router, StoreError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services))
}

/// Router over already-built services.
pub fn router(services: Arc<AppServices>) -> Router {
    // Media-type check runs on matched routes only; unmatched methods fall through to 405.
    let api = routes::router()
        .route_layer(axum::middleware::from_fn(middleware::require_json))
        .layer(Extension(services));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(api)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::request_context)))
}

pub use services::AppServices;
