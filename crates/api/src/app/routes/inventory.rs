use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use stockroom_inventory::{FilterParams, RecordDraft, UpdateFields};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_records).post(create_record))
        .route("/checkout/:product_id/:condition", put(checkout_record))
        .route(
            "/:product_id/:condition",
            get(get_record).put(update_record).delete(delete_record),
        )
}

pub async fn create_record(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let draft: RecordDraft = match dto::parse_json(&body) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    let record = match services.records().create(draft).await {
        Ok(r) => r,
        Err(e) => return errors::service_error_to_response(e),
    };

    let location = dto::record_location(&headers, &record.key);
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(dto::record_to_json(&record)),
    )
        .into_response()
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> axum::response::Response {
    let key = match dto::parse_record_path(path) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.records().get(&key).await {
        Ok(r) => (StatusCode::OK, Json(dto::record_to_json(&r))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    params: Result<Query<FilterParams>, QueryRejection>,
) -> axum::response::Response {
    let Query(params) = match params {
        Ok(q) => q,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text());
        }
    };

    match services.records().list(params).await {
        Ok(records) => {
            let items: Vec<_> = records.iter().map(dto::record_to_json).collect();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> axum::response::Response {
    let key = match dto::parse_record_path(path) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let changes: UpdateFields = match dto::parse_json(&body) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.records().update(key, changes).await {
        Ok(r) => (StatusCode::OK, Json(dto::record_to_json(&r))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn checkout_record(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Bytes,
) -> axum::response::Response {
    let key = match dto::parse_record_path(path) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let request: dto::CheckoutRequest = match dto::parse_json(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.records().checkout(key, request.ordered_quantity).await {
        Ok(r) => (StatusCode::OK, Json(dto::record_to_json(&r))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_record(
    Extension(services): Extension<Arc<AppServices>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> axum::response::Response {
    let key = match dto::parse_record_path(path) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.records().delete(key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
