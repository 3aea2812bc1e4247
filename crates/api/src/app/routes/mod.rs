use axum::{routing::get, Router};

pub mod inventory;
pub mod system;

/// Router for every endpoint that needs the shared services.
pub fn router() -> Router {
    Router::new()
        .route("/", get(system::index))
        .nest("/inventory", inventory::router())
}
