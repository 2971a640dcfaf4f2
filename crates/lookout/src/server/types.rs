//! REST API types with schemars annotations for OpenAPI generation

use base64::{engine::general_purpose::STANDARD, Engine as _};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RequestError;
use crate::journal::JournalEntry;
use crate::matcher::CameraResult;
use crate::task::{MatchQuery, TaskStatus};

// Base Response Structure
// ======================

/// Envelope for the service endpoints (status, version, logs)
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BaseResponse<T> {
  /// API versioning information
  pub versioning: VersionInfo,

  /// Transaction ID for logging correlation
  pub transaction_id: Uuid,

  /// Optional error information
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub errors: Vec<ApiError>,

  /// Response data (generic for different endpoint types)
  #[serde(flatten)]
  pub data: T,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionInfo {
  pub latest: String,
  pub resolved: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Error key, unique to the error source
  pub key: String,

  /// Human readable error message
  pub message: String,
}

impl<T> BaseResponse<T> {
  pub fn success(data: T, transaction_id: Uuid) -> Self {
    Self { versioning: VersionInfo::current(), transaction_id, errors: Vec::new(), data }
  }

  pub fn error(errors: Vec<ApiError>, transaction_id: Uuid) -> BaseResponse<()> {
    BaseResponse { versioning: VersionInfo::current(), transaction_id, errors, data: () }
  }
}

impl VersionInfo {
  fn current() -> Self {
    let version = env!("CARGO_PKG_VERSION");
    Self { latest: version.to_string(), resolved: version.to_string() }
  }
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string() }
  }
}

// Status/Version Endpoints
// =======================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  pub status: String,
  pub version: String,
  /// Archive root the server scans
  pub archive_root: String,
  pub archive_available: bool,
  /// Tasks holding a registry slot right now
  pub in_flight_tasks: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionResponse {
  pub version: String,
}

// Logs Endpoint
// =============

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
  pub limit: Option<usize>,
  pub level: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LogsResponse {
  pub logs: Vec<JournalEntry>,
}

// Match Endpoint
// ==============

/// Integer seconds, accepted as a JSON integer, an integral float or a
/// numeric string
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EpochValue {
  Int(i64),
  Float(f64),
  Text(String),
}

/// Opaque identifier, accepted as a string or a number
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum IdValue {
  Text(String),
  Int(i64),
}

/// A single camera id or a list of them
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CameraIdField {
  One(IdValue),
  Many(Vec<IdValue>),
}

/// JSON form of POST /extract_features
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct MatchRequestBody {
  /// Base64 encoded images
  #[serde(default)]
  pub images: Vec<String>,
  pub start_epoch: Option<EpochValue>,
  pub end_epoch: Option<EpochValue>,
  pub camera_id: Option<CameraIdField>,
  pub person_id: Option<IdValue>,
}

/// Response of POST /extract_features once the task finished
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MatchResponse {
  pub task_id: Uuid,
  pub status: TaskStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result: Option<Vec<CameraResult>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// Plain error body for rejected or timed out match requests
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
  pub error: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task_id: Option<Uuid>,
}

impl EpochValue {
  pub fn to_epoch(&self, field: &str) -> Result<i64, RequestError> {
    match self {
      EpochValue::Int(value) => Ok(*value),
      EpochValue::Float(value) => float_epoch(*value, field),
      EpochValue::Text(text) => parse_epoch(text, field),
    }
  }
}

fn float_epoch(value: f64, field: &str) -> Result<i64, RequestError> {
  if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
    Ok(value as i64)
  } else {
    Err(RequestError::invalid_field(field, format!("{value} is not an integer epoch")))
  }
}

pub fn parse_epoch(text: &str, field: &str) -> Result<i64, RequestError> {
  text
    .trim()
    .parse::<i64>()
    .map_err(|_| RequestError::invalid_field(field, format!("'{text}' is not an integer epoch")))
}

impl IdValue {
  pub fn into_id(self) -> String {
    match self {
      IdValue::Text(text) => text,
      IdValue::Int(value) => value.to_string(),
    }
  }
}

impl CameraIdField {
  /// Normalize to a list, whatever shape was submitted
  pub fn into_list(self) -> Vec<String> {
    match self {
      CameraIdField::One(id) => vec![id.into_id()],
      CameraIdField::Many(ids) => ids.into_iter().map(IdValue::into_id).collect(),
    }
  }
}

/// Base64 decode every image, rejecting the request on the first failure
pub fn decode_images(encoded: &[String]) -> Result<Vec<Vec<u8>>, RequestError> {
  encoded
    .iter()
    .map(|image| STANDARD.decode(image.trim()).map_err(|e| RequestError::ImageDecode(e.to_string())))
    .collect()
}

impl MatchRequestBody {
  pub fn into_query(self) -> Result<MatchQuery, RequestError> {
    let images = decode_images(&self.images)?;
    if images.iter().all(|image| image.is_empty()) {
      return Err(RequestError::NoImages);
    }

    let start_epoch = self
      .start_epoch
      .ok_or_else(|| RequestError::MissingField("start_epoch".into()))?
      .to_epoch("start_epoch")?;
    let end_epoch =
      self.end_epoch.ok_or_else(|| RequestError::MissingField("end_epoch".into()))?.to_epoch("end_epoch")?;
    let camera_ids = self.camera_id.ok_or_else(|| RequestError::MissingField("camera_id".into()))?.into_list();
    let person_id = self.person_id.ok_or_else(|| RequestError::MissingField("person_id".into()))?.into_id();

    Ok(MatchQuery { images, camera_ids, person_id, start_epoch, end_epoch })
  }
}
