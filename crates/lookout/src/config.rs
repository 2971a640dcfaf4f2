//! Configuration management for the lookout server
//!
//! Settings are read from a YAML file (explicit path, `LOOKOUT_CONFIG`, or
//! `./lookout.yaml`), then selected environment variables override them.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "LOOKOUT_CONFIG";
pub const ARCHIVE_ROOT_ENV: &str = "LOOKOUT_ARCHIVE_ROOT";
pub const BIND_ENV: &str = "LOOKOUT_BIND";

const DEFAULT_CONFIG_FILE: &str = "lookout.yaml";

/// How epoch seconds from a request map onto the archive's wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimezoneMode {
  #[default]
  Local,
  Utc,
}

/// How per-track matches fold into a camera's first/last sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
  /// First and last match encountered while scanning tracks in order
  #[default]
  ScanOrder,
  /// Earliest and latest matching timestamp
  Chronological,
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Root directory holding one subdirectory per camera
  pub archive_root: PathBuf,
  /// HTTP bind address
  pub bind: SocketAddr,
  /// Mean distance below which a record matches (exclusive)
  pub distance_threshold: f32,
  /// Real matches per track after which the threshold is bypassed; `None` disables the bypass
  pub bypass_after: Option<usize>,
  /// How long a caller waits for its task before giving up
  pub wait_timeout_secs: u64,
  pub timezone: TimezoneMode,
  pub aggregation: Aggregation,
  /// Upper bound on simultaneously running workers; `None` is unbounded
  pub max_concurrent_tasks: Option<usize>,
  /// Request body limit for image uploads
  pub max_body_bytes: usize,
  /// Embedding service endpoint
  pub embedder_url: String,
  /// Model name forwarded to the embedding service; `None` uses its default
  pub embedder_model: Option<String>,
  pub embedder_timeout_secs: u64,
  /// JSONL task journal location
  pub journal_path: PathBuf,
}

impl Default for Config {
  fn default() -> Self {
    let base = lookout_home();
    Self {
      archive_root: base.join("archive"),
      bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
      distance_threshold: 360.0,
      bypass_after: Some(12),
      wait_timeout_secs: 200,
      timezone: TimezoneMode::Local,
      aggregation: Aggregation::ScanOrder,
      max_concurrent_tasks: None,
      max_body_bytes: 32 * 1024 * 1024,
      embedder_url: "http://127.0.0.1:8501/embed".to_string(),
      embedder_model: None,
      embedder_timeout_secs: 60,
      journal_path: base.join("tasks.logs.jsonl"),
    }
  }
}

impl Config {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

    if content.trim().is_empty() {
      return Ok(Self::default());
    }

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
  }

  /// Resolve, load, apply environment overrides and validate
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match Self::resolve_path(explicit) {
      Some(path) => Self::load_from_file(path)?,
      None => Self::default(),
    };
    config.apply_env()?;
    config.validate()?;
    Ok(config)
  }

  fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
      return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
      return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
  }

  fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(root) = env::var(ARCHIVE_ROOT_ENV) {
      self.archive_root = PathBuf::from(root);
    }
    if let Ok(bind) = env::var(BIND_ENV) {
      self.bind = bind
        .parse()
        .map_err(|e| ConfigError::Invalid { field: "bind", reason: format!("{bind}: {e}") })?;
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
      return Err(ConfigError::Invalid {
        field: "distance_threshold",
        reason: format!("must be a positive number, got {}", self.distance_threshold),
      });
    }
    if self.wait_timeout_secs == 0 {
      return Err(ConfigError::Invalid { field: "wait_timeout_secs", reason: "must be greater than zero".into() });
    }
    if self.embedder_timeout_secs == 0 {
      return Err(ConfigError::Invalid {
        field: "embedder_timeout_secs",
        reason: "must be greater than zero".into(),
      });
    }
    if self.bypass_after == Some(0) {
      return Err(ConfigError::Invalid {
        field: "bypass_after",
        reason: "use null to disable the bypass instead of 0".into(),
      });
    }
    if self.max_concurrent_tasks == Some(0) {
      return Err(ConfigError::Invalid {
        field: "max_concurrent_tasks",
        reason: "use null for unbounded instead of 0".into(),
      });
    }
    Ok(())
  }

  pub fn wait_timeout(&self) -> Duration {
    Duration::from_secs(self.wait_timeout_secs)
  }

  pub fn embedder_timeout(&self) -> Duration {
    Duration::from_secs(self.embedder_timeout_secs)
  }
}

fn lookout_home() -> PathBuf {
  dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(".lookout")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn clear_env() {
    env::remove_var(CONFIG_ENV);
    env::remove_var(ARCHIVE_ROOT_ENV);
    env::remove_var(BIND_ENV);
  }

  #[test]
  fn test_defaults_match_matching_policy() {
    let config = Config::default();
    assert_eq!(config.distance_threshold, 360.0);
    assert_eq!(config.bypass_after, Some(12));
    assert_eq!(config.wait_timeout(), Duration::from_secs(200));
    assert_eq!(config.aggregation, Aggregation::ScanOrder);
    assert!(config.validate().is_ok());
  }

  #[test]
  #[serial]
  fn test_load_partial_yaml_keeps_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lookout.yaml");
    std::fs::write(&path, "archive_root: /srv/features\naggregation: chronological\ntimezone: utc\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.archive_root, PathBuf::from("/srv/features"));
    assert_eq!(config.aggregation, Aggregation::Chronological);
    assert_eq!(config.timezone, TimezoneMode::Utc);
    assert_eq!(config.distance_threshold, 360.0);
    assert_eq!(config.embedder_model, None);
  }

  #[test]
  #[serial]
  fn test_env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lookout.yaml");
    std::fs::write(&path, "archive_root: /srv/features\n").unwrap();

    env::set_var(CONFIG_ENV, &path);
    env::set_var(ARCHIVE_ROOT_ENV, dir.path());
    env::set_var(BIND_ENV, "0.0.0.0:8080");

    let config = Config::load(None).unwrap();
    clear_env();

    assert_eq!(config.archive_root, dir.path());
    assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
  }

  #[test]
  #[serial]
  fn test_invalid_bind_env_is_rejected() {
    clear_env();
    env::set_var(BIND_ENV, "not-an-address");
    let result = Config::load(None);
    clear_env();

    assert!(matches!(result, Err(ConfigError::Invalid { field: "bind", .. })));
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let config = Config { distance_threshold: 0.0, ..Config::default() };
    assert!(config.validate().is_err());

    let config = Config { max_concurrent_tasks: Some(0), ..Config::default() };
    assert!(config.validate().is_err());

    let config = Config { wait_timeout_secs: 0, ..Config::default() };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_zero_bypass_is_rejected() {
    let config = Config { bypass_after: Some(0), ..Config::default() };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "bypass_after", .. })));

    let config = Config { bypass_after: None, ..Config::default() };
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_malformed_yaml_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "distance_threshold: [not, a, number]\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"));
  }
}
