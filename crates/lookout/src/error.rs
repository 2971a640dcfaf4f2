//! Error types for each layer of the sighting search

use std::path::PathBuf;
use thiserror::Error;

/// A timestamp string that does not match the archive layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid timestamp '{input}': {reason}")]
pub struct TimestampError {
  pub input: String,
  pub reason: String,
}

impl TimestampError {
  pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
    Self { input: input.into(), reason: reason.into() }
  }
}

/// Failures reading a camera archive. Per-track failures are logged and the
/// track is skipped; only listing failures reach the task.
#[derive(Error, Debug)]
pub enum ArchiveError {
  #[error("Failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Corrupt track file {path}: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Track file {path} has unsupported schema version {version}")]
  UnsupportedVersion { path: PathBuf, version: u32 },
}

impl ArchiveError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

/// Failures from the embedding collaborator
#[derive(Error, Debug)]
pub enum EmbedError {
  #[error("Embedding service request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Embedding service error: {0}")]
  Service(String),

  #[error("Embedding dimension mismatch: query has {query}, candidate has {candidate}")]
  DimensionMismatch { query: usize, candidate: usize },
}

/// Errors that abort a whole scan task
#[derive(Error, Debug)]
pub enum ScanError {
  #[error(transparent)]
  Timestamp(#[from] TimestampError),

  #[error(transparent)]
  Embed(#[from] EmbedError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("Scan worker stopped unexpectedly: {0}")]
  Worker(String),
}

/// Malformed match requests, rejected before any task is created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
  #[error("No images found in the request.")]
  NoImages,

  #[error("Error decoding base64 image: {0}")]
  ImageDecode(String),

  #[error("Invalid field '{field}': {reason}")]
  InvalidField { field: String, reason: String },

  #[error("Missing field '{0}'")]
  MissingField(String),

  #[error("Start time must be before end time.")]
  InvalidWindow { start: i64, end: i64 },

  #[error("At least one camera_id is required")]
  NoCameras,
}

impl RequestError {
  pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidField { field: field.into(), reason: reason.into() }
  }
}

/// Configuration problems detected at startup
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to parse config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("Invalid config value for {field}: {reason}")]
  Invalid { field: &'static str, reason: String },
}
