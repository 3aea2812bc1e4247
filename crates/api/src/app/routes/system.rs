use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::services::AppServices;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

/// Service name, version, and where the resources live.
pub async fn index(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Inventory REST API Service",
        "version": env!("CARGO_PKG_VERSION"),
        "store": services.backend().as_str(),
        "paths": {
            "records": "/inventory",
            "record": "/inventory/{product_id}/{condition}",
            "checkout": "/inventory/checkout/{product_id}/{condition}",
            "health": "/health",
        },
    }))
}
