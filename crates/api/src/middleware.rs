use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::app::errors;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tag every request with a UUIDv7, log it inside a span, and echo the id back.
pub async fn request_context(req: Request, next: Next) -> Response {
    let request_id = Uuid::now_v7();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;
        tracing::info!(status = response.status().as_u16(), "request completed");
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

/// Requests that carry a body must declare it as JSON.
pub async fn require_json(req: Request, next: Next) -> Response {
    if matches!(*req.method(), Method::POST | Method::PUT) && !is_json(req.headers()) {
        let got = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        return errors::json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupported_media_type",
            format!("Content-Type must be application/json (got {got})"),
        );
    }
    next.run(req).await
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_content_type(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, value.parse().unwrap());
        headers
    }

    #[test]
    fn accepts_json_with_parameters() {
        assert!(is_json(&with_content_type("application/json")));
        assert!(is_json(&with_content_type("Application/JSON; charset=utf-8")));
    }

    #[test]
    fn rejects_missing_or_other_types() {
        assert!(!is_json(&HeaderMap::new()));
        assert!(!is_json(&with_content_type("text/plain")));
        assert!(!is_json(&with_content_type("application/x-www-form-urlencoded")));
        assert!(!is_json(&with_content_type("application/jsonp")));
    }
}
