use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::NotAllowed(msg) => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "not_allowed", msg)
        }
        ServiceError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    let message = message.into();
    if status.is_client_error() {
        tracing::warn!(status = status.as_u16(), code, %message, "request rejected");
    }
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message,
        })),
    )
        .into_response()
}
