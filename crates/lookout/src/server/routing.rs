//! Axum router configuration for all endpoints

use axum::{
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
  Router,
};

use crate::server::handlers::{logs, matching, status};
use crate::server::{middleware::request_context_middleware, AppState};

/// Create the application router with the request context middleware
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
  Router::new()
    // Status and version endpoints
    .route("/status", get(status::status))
    .route("/version", get(status::version))
    .route("/logs", get(logs::get_logs))
    .route("/extract_features", post(matching::extract_features))
    .layer(DefaultBodyLimit::max(max_body_bytes))
    .layer(middleware::from_fn_with_state(state.clone(), request_context_middleware))
    .with_state(state)
}
