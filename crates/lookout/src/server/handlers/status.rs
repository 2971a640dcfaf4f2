//! Status and version endpoint handlers

use axum::{extract::State, response::Json};
use uuid::Uuid;

use crate::server::types::{BaseResponse, StatusResponse, VersionResponse};
use crate::server::AppState;

/// GET /status - Health check endpoint
pub async fn status(State(state): State<AppState>) -> Json<BaseResponse<StatusResponse>> {
  let transaction_id = Uuid::new_v4();
  let version = env!("CARGO_PKG_VERSION");

  let response = StatusResponse {
    status: "healthy".to_string(),
    version: version.to_string(),
    archive_root: state.archive_root.to_string_lossy().to_string(),
    archive_available: state.archive_root.is_dir(),
    in_flight_tasks: state.orchestrator.in_flight().await,
  };

  Json(BaseResponse::success(response, transaction_id))
}

/// GET /version - Returns current API version
pub async fn version() -> Json<BaseResponse<VersionResponse>> {
  let transaction_id = Uuid::new_v4();
  let version = env!("CARGO_PKG_VERSION");
  let response = VersionResponse { version: version.to_string() };

  Json(BaseResponse::success(response, transaction_id))
}
