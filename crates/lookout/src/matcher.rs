//! Track and camera scanning
//!
//! A track is scanned record by record in archive order. Records outside the
//! window are skipped; the rest are compared against the query by mean
//! distance. After `bypass_after` real matches in one track the threshold is
//! bypassed and every further in-window record of that track counts as a
//! match without computing a distance.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveReader, Embedding, Record};
use crate::config::Aggregation;
use crate::embedder::{mean, Embedder};
use crate::error::ScanError;
use crate::timestamp::{Timestamp, Window};

pub const NO_MATCH_MESSAGE: &str = "No matching features found within the specified distance.";

/// Threshold and early-stop settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
  /// Exclusive upper bound on the mean distance
  pub threshold: f32,
  /// Real matches after which a track stops computing distances
  pub bypass_after: Option<usize>,
}

impl Default for MatchPolicy {
  fn default() -> Self {
    Self { threshold: 360.0, bypass_after: Some(12) }
  }
}

impl MatchPolicy {
  pub fn is_match(&self, distance: f32) -> bool {
    distance < self.threshold
  }
}

/// Per-track scan state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
  pub matches_seen: usize,
  /// Set once `matches_seen` reaches the policy's bypass count
  pub threshold_bypass: bool,
}

impl ScanState {
  fn record_match(&mut self, policy: &MatchPolicy) {
    self.matches_seen += 1;
    if policy.bypass_after.is_some_and(|limit| self.matches_seen >= limit) {
      self.threshold_bypass = true;
    }
  }
}

/// Matched timestamps seen so far, both in scan order and chronologically
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SightingSpan {
  pub first: Option<Timestamp>,
  pub last: Option<Timestamp>,
  pub earliest: Option<Timestamp>,
  pub latest: Option<Timestamp>,
}

impl SightingSpan {
  pub fn observe(&mut self, ts: Timestamp) {
    self.first.get_or_insert(ts);
    self.last = Some(ts);
    self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
    self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
  }

  /// Fold a later-scanned span into this one
  pub fn merge(&mut self, later: &SightingSpan) {
    if self.first.is_none() {
      self.first = later.first;
    }
    if later.last.is_some() {
      self.last = later.last;
    }
    self.earliest = min_opt(self.earliest, later.earliest);
    self.latest = max_opt(self.latest, later.latest);
  }

  pub fn bounds(&self, aggregation: Aggregation) -> (Option<Timestamp>, Option<Timestamp>) {
    match aggregation {
      Aggregation::ScanOrder => (self.first, self.last),
      Aggregation::Chronological => (self.earliest, self.latest),
    }
  }
}

fn min_opt(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (a, b) => a.or(b),
  }
}

fn max_opt(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.max(b)),
    (a, b) => a.or(b),
  }
}

/// Outcome of scanning one track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackScan {
  pub state: ScanState,
  pub span: SightingSpan,
}

/// Scan one track's records against the query.
///
/// A record whose timestamp does not parse aborts the scan with
/// [`ScanError::Timestamp`]; callers treat that as fatal for the whole task.
pub fn scan_track(
  query: &[Embedding],
  records: &[Record],
  window: &Window,
  policy: &MatchPolicy,
  embedder: &dyn Embedder,
) -> Result<TrackScan, ScanError> {
  let mut scan = TrackScan::default();

  for record in records {
    let ts = Timestamp::parse(&record.timestamp)?;
    if !window.contains(&ts) {
      continue;
    }

    let matched = if scan.state.threshold_bypass {
      true
    } else {
      let distances = embedder.distance(query, &record.embedding)?;
      policy.is_match(mean(&distances))
    };

    if matched {
      scan.state.record_match(policy);
      scan.span.observe(ts);
    }
  }

  Ok(scan)
}

/// Result entry for one requested camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CameraResult {
  Scanned(CameraSighting),
  Missing(MissingCamera),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CameraSighting {
  pub camera_id: String,
  pub person_id: String,
  pub first_match: Option<Timestamp>,
  pub last_match: Option<Timestamp>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MissingCamera {
  pub camera_id: String,
  pub error: String,
}

impl CameraResult {
  pub fn camera_id(&self) -> &str {
    match self {
      CameraResult::Scanned(s) => &s.camera_id,
      CameraResult::Missing(m) => &m.camera_id,
    }
  }

  pub fn sighting(&self) -> Option<&CameraSighting> {
    match self {
      CameraResult::Scanned(s) => Some(s),
      CameraResult::Missing(_) => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      CameraResult::Missing(m) => Some(&m.error),
      CameraResult::Scanned(_) => None,
    }
  }
}

/// Everything a camera scan needs besides the camera id
pub struct ScanContext<'a> {
  pub archive: &'a dyn ArchiveReader,
  pub embedder: &'a dyn Embedder,
  pub query: &'a [Embedding],
  pub window: Window,
  pub policy: MatchPolicy,
  pub aggregation: Aggregation,
  pub person_id: &'a str,
}

/// Scan every track of a camera, folding matches in track order
pub fn scan_camera(ctx: &ScanContext<'_>, camera_id: &str) -> Result<CameraResult, ScanError> {
  if !ctx.archive.camera_exists(camera_id) {
    tracing::warn!(camera_id, "camera not found in archive");
    return Ok(CameraResult::Missing(MissingCamera {
      camera_id: camera_id.to_string(),
      error: format!("Camera ID {camera_id} not found"),
    }));
  }

  let mut span = SightingSpan::default();
  for track_id in ctx.archive.list_tracks(camera_id)? {
    let records = ctx.archive.load_track(camera_id, &track_id);
    let scan = scan_track(ctx.query, &records, &ctx.window, &ctx.policy, ctx.embedder)?;

    if scan.state.matches_seen > 0 {
      tracing::debug!(camera_id, track_id = %track_id, matches = scan.state.matches_seen, "track matched");
    }
    span.merge(&scan.span);
  }

  let (first_match, last_match) = span.bounds(ctx.aggregation);
  let message = first_match.is_none().then(|| NO_MATCH_MESSAGE.to_string());

  Ok(CameraResult::Scanned(CameraSighting {
    camera_id: camera_id.to_string(),
    person_id: ctx.person_id.to_string(),
    first_match,
    last_match,
    message,
  }))
}

/// Scan cameras in request order
pub fn scan_cameras(ctx: &ScanContext<'_>, camera_ids: &[String]) -> Result<Vec<CameraResult>, ScanError> {
  camera_ids.iter().map(|camera_id| scan_camera(ctx, camera_id)).collect()
}
