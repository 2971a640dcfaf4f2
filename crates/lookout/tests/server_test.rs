mod common;

use axum::{
  body::{to_bytes, Body},
  http::{Request, StatusCode},
  Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use common::*;
use lookout::server::{routing::create_router, AppState};

struct TestServer {
  app: Router,
  _archive: TestArchive,
  _journal_dir: TempDir,
}

fn server(archive: TestArchive, delay: Option<Duration>, wait_timeout: Duration) -> TestServer {
  let journal_dir = TempDir::new().unwrap();
  let journal = silent_journal(journal_dir.path());
  let state = AppState {
    orchestrator: Arc::new(orchestrator(&archive, delay).with_journal(journal.clone())),
    journal,
    archive_root: archive.root().to_path_buf(),
    wait_timeout,
  };
  TestServer { app: create_router(state, 1024 * 1024), _archive: archive, _journal_dir: journal_dir }
}

fn archive_with_sighting() -> TestArchive {
  let archive = TestArchive::new();
  let (a, b) = (ts(5), ts(20));
  archive.track("cam1", "t1", &[(10.0, a.as_str()), (500.0, ts(10).as_str()), (20.0, b.as_str())]);
  archive
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(body: Value) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri("/extract_features")
    .header("content-type", "application/json")
    .body(Body::from(body.to_string()))
    .unwrap()
}

fn get(uri: &str) -> Request<Body> {
  Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn match_body() -> Value {
  json!({
    "images": [STANDARD.encode(b"reference image")],
    "start_epoch": WINDOW_START,
    "end_epoch": WINDOW_END.to_string(),
    "camera_id": ["cam1", "cam9"],
    "person_id": "person-7"
  })
}

#[tokio::test]
async fn test_extract_features_json() {
  let server = server(archive_with_sighting(), None, Duration::from_secs(10));

  let (status, body) = send(&server.app, post_json(match_body())).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "completed");
  assert!(body["task_id"].is_string());

  let result = body["result"].as_array().unwrap();
  assert_eq!(result.len(), 2);
  assert_eq!(result[0]["camera_id"], "cam1");
  assert_eq!(result[0]["person_id"], "person-7");
  assert_eq!(result[0]["first_match"], "2023-11-14T22:18:20.000");
  assert_eq!(result[0]["last_match"], "2023-11-14T22:33:20.000");
  assert_eq!(result[1], json!({"camera_id": "cam9", "error": "Camera ID cam9 not found"}));
}

#[tokio::test]
async fn test_scalar_numeric_camera_id() {
  let archive = TestArchive::new();
  let stamp = ts(1);
  archive.track("42", "t1", &[(1.0, stamp.as_str())]);
  let server = server(archive, None, Duration::from_secs(10));

  let mut body = match_body();
  body["camera_id"] = json!(42);
  let (status, body) = send(&server.app, post_json(body)).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["result"][0]["camera_id"], "42");
  assert_eq!(body["result"][0]["first_match"], "2023-11-14T22:14:20.000");
}

#[tokio::test]
async fn test_rejects_requests_without_images() {
  let server = server(TestArchive::new(), None, Duration::from_secs(10));

  let mut body = match_body();
  body["images"] = json!([]);
  let (status, body) = send(&server.app, post_json(body)).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body, json!({"error": "No images found in the request."}));
}

#[tokio::test]
async fn test_rejects_bad_base64() {
  let server = server(TestArchive::new(), None, Duration::from_secs(10));

  let mut body = match_body();
  body["images"] = json!(["not base64!"]);
  let (status, body) = send(&server.app, post_json(body)).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().starts_with("Error decoding base64 image"));
}

#[tokio::test]
async fn test_rejects_reversed_window() {
  let server = server(archive_with_sighting(), None, Duration::from_secs(10));

  let mut body = match_body();
  body["start_epoch"] = json!(WINDOW_END);
  body["end_epoch"] = json!(WINDOW_START);
  let (status, body) = send(&server.app, post_json(body)).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "Start time must be before end time.");
}

#[tokio::test]
async fn test_failed_task_is_reported_with_200() {
  let archive = TestArchive::new();
  archive.track("cam1", "t1", &[(1.0, "garbage")]);
  let server = server(archive, None, Duration::from_secs(10));

  let (status, body) = send(&server.app, post_json(match_body())).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "failed");
  assert!(body["error"].as_str().unwrap().contains("garbage"));
  assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_slow_task_times_out_with_504() {
  let server = server(archive_with_sighting(), Some(Duration::from_millis(300)), Duration::from_millis(50));

  let (status, body) = send(&server.app, post_json(match_body())).await;

  assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
  assert_eq!(body["error"], "Task did not complete in time.");
}

#[tokio::test]
async fn test_extract_features_multipart() {
  let server = server(archive_with_sighting(), None, Duration::from_secs(10));

  let boundary = "lookout-boundary";
  let mut payload = Vec::new();
  payload.extend_from_slice(
    format!(
      "--{boundary}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"ref.jpg\"\r\n\
       Content-Type: image/jpeg\r\n\r\n"
    )
    .as_bytes(),
  );
  payload.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe0]);
  payload.extend_from_slice(b"\r\n");
  for (name, value) in [
    ("start_epoch", WINDOW_START.to_string()),
    ("end_epoch", WINDOW_END.to_string()),
    ("camera_id", "cam1".to_string()),
    ("camera_id", "cam2".to_string()),
    ("person_id", "person-7".to_string()),
  ] {
    payload.extend_from_slice(
      format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
    );
  }
  payload.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

  let request = Request::builder()
    .method("POST")
    .uri("/extract_features")
    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
    .body(Body::from(payload))
    .unwrap();
  let (status, body) = send(&server.app, request).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["result"][0]["first_match"], "2023-11-14T22:18:20.000");
  assert_eq!(body["result"][1]["error"], "Camera ID cam2 not found");
}

#[tokio::test]
async fn test_status_and_version() {
  let server = server(TestArchive::new(), None, Duration::from_secs(10));

  let (status, body) = send(&server.app, get("/status")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "healthy");
  assert_eq!(body["archive_available"], true);
  assert_eq!(body["in_flight_tasks"], 0);
  assert!(body["transaction_id"].is_string());

  let (status, body) = send(&server.app, get("/version")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
  assert_eq!(body["versioning"]["latest"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_logs_record_task_lifecycle() {
  let server = server(archive_with_sighting(), None, Duration::from_secs(10));
  send(&server.app, post_json(match_body())).await;

  let (status, body) = send(&server.app, get("/logs?level=info")).await;
  assert_eq!(status, StatusCode::OK);
  let messages: Vec<&str> = body["logs"].as_array().unwrap().iter().filter_map(|e| e["message"].as_str()).collect();
  assert!(messages.iter().any(|m| m.starts_with("submitted for 2 camera(s)")), "{messages:?}");
  assert!(messages.iter().any(|m| m.starts_with("completed with 2 camera result(s)")), "{messages:?}");

  let (status, body) = send(&server.app, get("/logs?level=loud")).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["errors"][0]["key"], "invalid_level");
}
