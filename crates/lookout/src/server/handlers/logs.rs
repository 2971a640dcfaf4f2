//! Logs endpoint handler

use axum::{
  extract::{Extension, Query},
  http::StatusCode,
  response::Json,
};
use uuid::Uuid;

use crate::journal::Level;
use crate::server::{
  middleware::RequestContext,
  types::{ApiError, BaseResponse, LogsQuery, LogsResponse},
};

const DEFAULT_LIMIT: usize = 100;

/// GET /logs - Recent task journal entries, optionally filtered by level
pub async fn get_logs(
  Extension(context): Extension<RequestContext>,
  Query(query): Query<LogsQuery>,
) -> Result<Json<BaseResponse<LogsResponse>>, (StatusCode, Json<BaseResponse<()>>)> {
  let transaction_id = Uuid::new_v4();

  let level = match query.level.as_deref() {
    None => None,
    Some(raw) => match Level::parse(raw) {
      Some(level) => Some(level),
      None => {
        let error = ApiError::new("invalid_level", &format!("Unknown log level '{raw}'"));
        return Err((StatusCode::BAD_REQUEST, Json(BaseResponse::<()>::error(vec![error], transaction_id))));
      }
    },
  };

  match context.journal.get_logs(Some(query.limit.unwrap_or(DEFAULT_LIMIT)), level).await {
    Ok(logs) => Ok(Json(BaseResponse::success(LogsResponse { logs }, transaction_id))),
    Err(e) => {
      context.log(Level::Error, "logs-api", &format!("Failed to read logs: {e}")).await;
      let error = ApiError::new("logs_read_failed", &format!("Failed to read logs: {e}"));
      Err((StatusCode::INTERNAL_SERVER_ERROR, Json(BaseResponse::<()>::error(vec![error], transaction_id))))
    }
  }
}
