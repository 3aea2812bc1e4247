use axum::extract::{rejection::PathRejection, Path};
use axum::http::{header, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use stockroom_core::ProductId;
use stockroom_inventory::{Condition, InventoryRecord, RecordKey};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub ordered_quantity: i64,
}

/// Decode a JSON object body. Malformed JSON, non-object bodies and wrongly typed
/// fields are all 400s.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, axum::response::Response> {
    let invalid = |reason: String| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid request body: {reason}"),
        )
    };

    // Derived structs also deserialize from arrays by position; only objects are payloads.
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(invalid("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| invalid(e.to_string()))
}

/// Resolve the `/{product_id}/{condition}` path segments, turning axum's rejection
/// into the common error shape.
pub fn parse_record_path(
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<RecordKey, axum::response::Response> {
    let Path((product_id, condition)) = path.map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.body_text())
    })?;
    parse_record_key(&product_id, &condition)
}

pub fn parse_record_key(
    product_id: &str,
    condition: &str,
) -> Result<RecordKey, axum::response::Response> {
    let product_id: ProductId = product_id.parse().map_err(|e: stockroom_core::DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string())
    })?;
    let condition: Condition = condition.parse().map_err(|e: stockroom_core::DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    })?;
    Ok(RecordKey::new(product_id, condition))
}

// -------------------------
// Response mapping
// -------------------------

pub fn record_to_json(r: &InventoryRecord) -> serde_json::Value {
    serde_json::json!({
        "product_id": r.key.product_id.get(),
        "condition": r.key.condition.as_str(),
        "name": r.name,
        "quantity": r.quantity.get(),
        "reorder_quantity": r.reorder_quantity.get(),
        "restock_level": r.restock_level.get(),
        "active": r.active,
        "created_at": r.created_at.to_rfc3339(),
        "updated_at": r.updated_at.to_rfc3339(),
    })
}

pub fn record_path(key: &RecordKey) -> String {
    format!("/inventory/{}/{}", key.product_id, key.condition.as_str())
}

/// Absolute URL of a record when the client sent a `Host` header, otherwise the bare path.
pub fn record_location(headers: &HeaderMap, key: &RecordKey) -> String {
    let path = record_path(key);
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) if !host.is_empty() => format!("http://{host}{path}"),
        _ => path,
    }
}
