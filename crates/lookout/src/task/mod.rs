//! Match tasks
//!
//! A task answers one match query. It is created `Pending` at submission,
//! moved exactly once to `Completed` or `Failed` by its background worker,
//! and read at most once by the caller that submitted it.

mod orchestrator;
mod registry;

pub use orchestrator::{ScanSettings, TaskHandle, TaskOrchestrator, TaskOutcome};
pub use registry::{Publication, TaskId, TaskRegistry};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::TimezoneMode;
use crate::error::RequestError;
use crate::matcher::CameraResult;
use crate::timestamp::{Timestamp, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  Pending,
  Completed,
  Failed,
}

/// Task status together with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
  Pending,
  Completed(Vec<CameraResult>),
  Failed(String),
}

impl TaskState {
  pub fn status(&self) -> TaskStatus {
    match self {
      TaskState::Pending => TaskStatus::Pending,
      TaskState::Completed(_) => TaskStatus::Completed,
      TaskState::Failed(_) => TaskStatus::Failed,
    }
  }
}

/// A match request as received at the boundary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
  /// Raw encoded images; decoding is the embedder's concern
  pub images: Vec<Vec<u8>>,
  pub camera_ids: Vec<String>,
  pub person_id: String,
  pub start_epoch: i64,
  pub end_epoch: i64,
}

/// A query that passed validation and is ready to scan
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
  pub images: Vec<Vec<u8>>,
  pub camera_ids: Vec<String>,
  pub person_id: String,
  pub window: Window,
}

impl MatchQuery {
  pub fn validate(self, timezone: TimezoneMode) -> Result<ValidatedQuery, RequestError> {
    let images: Vec<Vec<u8>> = self.images.into_iter().filter(|image| !image.is_empty()).collect();
    if images.is_empty() {
      return Err(RequestError::NoImages);
    }
    if self.camera_ids.is_empty() {
      return Err(RequestError::NoCameras);
    }
    if self.start_epoch > self.end_epoch {
      return Err(RequestError::InvalidWindow { start: self.start_epoch, end: self.end_epoch });
    }

    let start = Timestamp::from_epoch(self.start_epoch, timezone)
      .ok_or_else(|| RequestError::invalid_field("start_epoch", "out of range"))?;
    let end = Timestamp::from_epoch(self.end_epoch, timezone)
      .ok_or_else(|| RequestError::invalid_field("end_epoch", "out of range"))?;
    let window = Window::new(start, end)
      .ok_or(RequestError::InvalidWindow { start: self.start_epoch, end: self.end_epoch })?;

    Ok(ValidatedQuery { images, camera_ids: self.camera_ids, person_id: self.person_id, window })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn query() -> MatchQuery {
    MatchQuery {
      images: vec![vec![1, 2, 3]],
      camera_ids: vec!["cam1".into()],
      person_id: "p1".into(),
      start_epoch: 1_700_000_000,
      end_epoch: 1_700_003_600,
    }
  }

  #[test]
  fn test_validate_builds_window() {
    let validated = query().validate(TimezoneMode::Utc).unwrap();
    assert_eq!(validated.window.start, Timestamp::from_epoch(1_700_000_000, TimezoneMode::Utc).unwrap());
    assert_eq!(validated.camera_ids, vec!["cam1"]);
  }

  #[test]
  fn test_validate_rejects_reversed_window() {
    let q = MatchQuery { start_epoch: 10, end_epoch: 5, ..query() };
    assert_eq!(q.validate(TimezoneMode::Utc).unwrap_err(), RequestError::InvalidWindow { start: 10, end: 5 });
  }

  #[test]
  fn test_validate_rejects_missing_images_and_cameras() {
    let q = MatchQuery { images: vec![vec![]], ..query() };
    assert_eq!(q.validate(TimezoneMode::Utc).unwrap_err(), RequestError::NoImages);

    let q = MatchQuery { camera_ids: vec![], ..query() };
    assert_eq!(q.validate(TimezoneMode::Utc).unwrap_err(), RequestError::NoCameras);
  }

  #[test]
  fn test_validate_rejects_out_of_range_epoch() {
    let q = MatchQuery { start_epoch: i64::MIN, ..query() };
    assert!(matches!(q.validate(TimezoneMode::Utc), Err(RequestError::InvalidField { .. })));
  }

  #[test]
  fn test_equal_bounds_are_valid() {
    let q = MatchQuery { start_epoch: 1_700_000_000, end_epoch: 1_700_000_000, ..query() };
    assert!(q.validate(TimezoneMode::Utc).is_ok());
  }
}
