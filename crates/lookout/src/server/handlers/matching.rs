//! Match endpoint handler

use axum::{
  body::Bytes,
  extract::{Extension, FromRequest, Multipart, Request, State},
  http::{header::CONTENT_TYPE, StatusCode},
  response::{IntoResponse, Json, Response},
};

use crate::error::RequestError;
use crate::journal::Level;
use crate::server::{
  middleware::RequestContext,
  types::{parse_epoch, ErrorBody, MatchRequestBody, MatchResponse},
  AppState,
};
use crate::task::{MatchQuery, TaskOutcome, TaskStatus};

const COMPONENT: &str = "match-api";
pub const TIMEOUT_MESSAGE: &str = "Task did not complete in time.";

/// POST /extract_features - Search the requested cameras for a person
///
/// Accepts `multipart/form-data` with `images` file parts or a JSON body
/// with base64 images. Blocks until the task finishes or the configured
/// wait bound elapses.
pub async fn extract_features(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  request: Request,
) -> Response {
  let query = match read_query(&state, request).await {
    Ok(query) => query,
    Err(e) => {
      context.log(Level::Warn, COMPONENT, &format!("Rejected match request: {e}")).await;
      return bad_request(&e);
    }
  };

  let outcome = match state.orchestrator.run(query, state.wait_timeout).await {
    Ok(outcome) => outcome,
    Err(e) => {
      context.log(Level::Warn, COMPONENT, &format!("Rejected match request: {e}")).await;
      return bad_request(&e);
    }
  };

  match outcome {
    TaskOutcome::Completed { task_id, results } => {
      let response = MatchResponse { task_id, status: TaskStatus::Completed, result: Some(results), error: None };
      (StatusCode::OK, Json(response)).into_response()
    }
    TaskOutcome::Failed { task_id, error } => {
      let response = MatchResponse { task_id, status: TaskStatus::Failed, result: None, error: Some(error) };
      (StatusCode::OK, Json(response)).into_response()
    }
    TaskOutcome::TimedOut { task_id } => {
      let body = ErrorBody { error: TIMEOUT_MESSAGE.to_string(), task_id: Some(task_id) };
      (StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
    }
  }
}

fn bad_request(error: &RequestError) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorBody { error: error.to_string(), task_id: None })).into_response()
}

async fn read_query(state: &AppState, request: Request) -> Result<MatchQuery, RequestError> {
  let is_multipart = request
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .is_some_and(|value| value.starts_with("multipart/form-data"));

  if is_multipart {
    let multipart = Multipart::from_request(request, state)
      .await
      .map_err(|e| RequestError::invalid_field("body", e.body_text()))?;
    return read_multipart(multipart).await?.into_query();
  }

  let body = Bytes::from_request(request, state)
    .await
    .map_err(|e| RequestError::invalid_field("body", e.body_text()))?;
  let body: MatchRequestBody =
    serde_json::from_slice(&body).map_err(|e| RequestError::invalid_field("body", e.to_string()))?;
  body.into_query()
}

/// Text and file parts of a multipart match request
#[derive(Debug, Default)]
struct MultipartQuery {
  images: Vec<Vec<u8>>,
  start_epoch: Option<String>,
  end_epoch: Option<String>,
  camera_ids: Vec<String>,
  person_id: Option<String>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<MultipartQuery, RequestError> {
  let mut form = MultipartQuery::default();

  while let Some(field) =
    multipart.next_field().await.map_err(|e| RequestError::invalid_field("body", e.body_text()))?
  {
    let Some(name) = field.name().map(str::to_string) else {
      continue;
    };

    if name == "images" {
      let bytes = field.bytes().await.map_err(|e| RequestError::invalid_field("images", e.body_text()))?;
      form.images.push(bytes.to_vec());
      continue;
    }

    let text = field.text().await.map_err(|e| RequestError::invalid_field(name.clone(), e.body_text()))?;
    match name.as_str() {
      "start_epoch" => form.start_epoch = Some(text),
      "end_epoch" => form.end_epoch = Some(text),
      "camera_id" => form.camera_ids.push(text.trim().to_string()),
      "person_id" => form.person_id = Some(text.trim().to_string()),
      other => tracing::debug!("ignoring multipart field '{other}'"),
    }
  }

  Ok(form)
}

impl MultipartQuery {
  fn into_query(self) -> Result<MatchQuery, RequestError> {
    if self.images.iter().all(|image| image.is_empty()) {
      return Err(RequestError::NoImages);
    }

    let start = self.start_epoch.ok_or_else(|| RequestError::MissingField("start_epoch".into()))?;
    let end = self.end_epoch.ok_or_else(|| RequestError::MissingField("end_epoch".into()))?;
    if self.camera_ids.is_empty() {
      return Err(RequestError::MissingField("camera_id".into()));
    }
    let person_id = self.person_id.ok_or_else(|| RequestError::MissingField("person_id".into()))?;

    Ok(MatchQuery {
      images: self.images,
      camera_ids: self.camera_ids,
      person_id,
      start_epoch: parse_epoch(&start, "start_epoch")?,
      end_epoch: parse_epoch(&end, "end_epoch")?,
    })
  }
}
