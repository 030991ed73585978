use axum::{extract::DefaultBodyLimit, http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod imports;
pub mod libraries;

/// Room for the JSON envelope around inline CSV content. Escaping can
/// double the size of quotes and newlines.
pub fn request_body_limit(max_file_size: usize) -> usize {
    max_file_size.saturating_mul(2).saturating_add(64 * 1024)
}

pub fn routes(max_file_size: usize) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .merge(imports::routes())
        .merge(libraries::routes())
        .layer(DefaultBodyLimit::max(request_body_limit(max_file_size)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
