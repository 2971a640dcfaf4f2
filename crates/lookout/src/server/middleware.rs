//! Request context and middleware for the REST API
//!
//! Every request gets a `RequestContext` carrying its id and the shared task
//! journal, injected into the request extensions.

use axum::{
  extract::{Request, State},
  http::{Method, Uri},
  middleware::Next,
  response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use super::AppState;
use crate::journal::{Level, TaskJournal};

const COMPONENT: &str = "http-request";

#[derive(Clone)]
pub struct RequestContext {
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub journal: TaskJournal,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri, journal: TaskJournal) -> Self {
    Self { request_id: Uuid::new_v4(), method, uri, journal }
  }

  /// Record a message prefixed with the request line
  pub async fn log(&self, level: Level, component: &str, message: &str) {
    let line = format!("[{}] {} {} - {}", self.request_id, self.method, self.uri.path(), message);
    self.journal.record(level, component, &line, None).await;
  }

  pub async fn log_request_start(&self) {
    self.log(Level::Debug, COMPONENT, "Request started").await;
  }

  pub async fn log_request_complete(&self, status_code: u16, duration_ms: f64) {
    let message = format!("Request completed (Status: {status_code}, Duration: {duration_ms:.2}ms)");
    let level = if status_code >= 500 { Level::Warn } else { Level::Debug };
    self.log(level, COMPONENT, &message).await;
  }
}

/// Inject a `RequestContext` and log each request's status and duration
pub async fn request_context_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
  let context = RequestContext::new(request.method().clone(), request.uri().clone(), state.journal.clone());
  request.extensions_mut().insert(context.clone());

  let start_time = Instant::now();
  context.log_request_start().await;
  let response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  context.log_request_complete(response.status().as_u16(), duration_ms).await;

  response
}
