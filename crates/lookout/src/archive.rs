//! Per-camera embedding archive
//!
//! The archive root holds one directory per camera id and one file per track
//! inside it. Each track file is a versioned JSON document:
//!
//! ```json
//! {"schema_version": 1, "records": [{"embedding": [0.1, 0.2], "timestamp": "2024-03-01_10-15-30-250"}]}
//! ```
//!
//! Records are written by an external ingestion pipeline; this module only
//! reads them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ArchiveError;

pub const TRACK_SCHEMA_VERSION: u32 = 1;

pub type Embedding = Vec<f32>;

/// One archived observation. The timestamp stays encoded until the matcher
/// needs it, so a malformed value surfaces where it is compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub embedding: Embedding,
  pub timestamp: String,
}

/// On-disk track document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFile {
  pub schema_version: u32,
  pub records: Vec<Record>,
}

impl TrackFile {
  pub fn new(records: Vec<Record>) -> Self {
    Self { schema_version: TRACK_SCHEMA_VERSION, records }
  }
}

/// Read access to camera archives
pub trait ArchiveReader: Send + Sync {
  fn camera_exists(&self, camera_id: &str) -> bool;

  /// Track ids of a camera in scan order
  fn list_tracks(&self, camera_id: &str) -> Result<Vec<String>, ArchiveError>;

  /// Records of one track in ingestion order. Unreadable tracks yield an
  /// empty sequence.
  fn load_track(&self, camera_id: &str, track_id: &str) -> Vec<Record>;
}

/// Filesystem archive rooted at a directory
#[derive(Debug, Clone)]
pub struct FsArchive {
  root: PathBuf,
}

impl FsArchive {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn camera_dir(&self, camera_id: &str) -> PathBuf {
    self.root.join(camera_id)
  }

  /// Read and decode a single track file, reporting why it failed
  pub fn read_track_file(path: &Path) -> Result<Vec<Record>, ArchiveError> {
    let content = fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
    let track: TrackFile = serde_json::from_slice(&content)
      .map_err(|source| ArchiveError::Corrupt { path: path.to_path_buf(), source })?;

    if track.schema_version != TRACK_SCHEMA_VERSION {
      return Err(ArchiveError::UnsupportedVersion { path: path.to_path_buf(), version: track.schema_version });
    }
    Ok(track.records)
  }
}

impl ArchiveReader for FsArchive {
  fn camera_exists(&self, camera_id: &str) -> bool {
    // Ids that would escape the root are treated as unknown cameras.
    if camera_id.is_empty() || camera_id.contains(['/', '\\']) || camera_id == ".." || camera_id == "." {
      return false;
    }
    self.camera_dir(camera_id).is_dir()
  }

  /// Regular files of the camera directory, sorted by name so repeated scans
  /// enumerate tracks identically.
  fn list_tracks(&self, camera_id: &str) -> Result<Vec<String>, ArchiveError> {
    let dir = self.camera_dir(camera_id);
    let entries = fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))?;

    let mut tracks = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| ArchiveError::io(&dir, e))?;
      if entry.path().is_file() {
        tracks.push(entry.file_name().to_string_lossy().to_string());
      }
    }
    tracks.sort();
    Ok(tracks)
  }

  fn load_track(&self, camera_id: &str, track_id: &str) -> Vec<Record> {
    let path = self.camera_dir(camera_id).join(track_id);
    match Self::read_track_file(&path) {
      Ok(records) => records,
      Err(e) => {
        tracing::warn!(camera_id, track_id, "skipping unreadable track: {e}");
        Vec::new()
      }
    }
  }
}
