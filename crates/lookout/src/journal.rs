//! Persistent task journal
//!
//! A JSONL file recording the lifecycle of every match task (submission,
//! completion, failure, timeout, discarded orphans) plus HTTP request lines.
//! Writes are serialized through an async mutex; each entry is also echoed to
//! the console through `tracing` unless the journal is silent.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Severity of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
  Debug,
  Info,
  Warn,
  Error,
}

impl Level {
  pub fn parse(value: &str) -> Option<Self> {
    match value.to_ascii_lowercase().as_str() {
      "debug" => Some(Level::Debug),
      "info" => Some(Level::Info),
      "warn" | "warning" => Some(Level::Warn),
      "error" => Some(Level::Error),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JournalEntry {
  pub timestamp: DateTime<Utc>,
  pub level: Level,
  pub component: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub task_id: Option<String>,
}

struct JournalInner {
  path: PathBuf,
  silent: bool,
}

impl JournalInner {
  fn append(&mut self, entry: &JournalEntry) -> std::io::Result<()> {
    let line = serde_json::to_string(entry)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
    writeln!(file, "{line}")?;
    file.flush()
  }

  /// Most recent `limit` entries with the exact `level`, oldest first
  fn read(&self, limit: Option<usize>, level: Option<Level>) -> std::io::Result<Vec<JournalEntry>> {
    if !self.path.exists() {
      return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(&self.path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      // Skip lines that are not journal entries
      let Ok(entry) = serde_json::from_str::<JournalEntry>(&line) else {
        continue;
      };
      if level.is_none_or(|wanted| entry.level == wanted) {
        entries.push(entry);
      }
    }

    if let Some(limit) = limit {
      let skip = entries.len().saturating_sub(limit);
      entries.drain(..skip);
    }
    Ok(entries)
  }
}

/// Thread-safe JSONL journal handle
#[derive(Clone)]
pub struct TaskJournal {
  inner: Arc<Mutex<JournalInner>>,
}

impl TaskJournal {
  pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
    Self::new_with_silent(path, false)
  }

  pub fn new_with_silent<P: AsRef<Path>>(path: P, silent: bool) -> std::io::Result<Self> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
      File::create(&path)?;
    }
    Ok(Self { inner: Arc::new(Mutex::new(JournalInner { path, silent })) })
  }

  pub async fn path(&self) -> PathBuf {
    self.inner.lock().await.path.clone()
  }

  /// Append an entry; write failures are reported on the console only
  pub async fn record(&self, level: Level, component: &str, message: &str, task_id: Option<&str>) {
    let entry = JournalEntry {
      timestamp: Utc::now(),
      level,
      component: component.to_string(),
      message: message.to_string(),
      task_id: task_id.map(str::to_string),
    };

    let mut guard = self.inner.lock().await;
    if !guard.silent {
      echo(&entry);
    }
    if let Err(e) = guard.append(&entry) {
      tracing::error!("failed to write task journal {}: {e}", guard.path.display());
    }
  }

  pub async fn info(&self, component: &str, message: &str) {
    self.record(Level::Info, component, message, None).await;
  }

  pub async fn warn(&self, component: &str, message: &str) {
    self.record(Level::Warn, component, message, None).await;
  }

  pub async fn error(&self, component: &str, message: &str) {
    self.record(Level::Error, component, message, None).await;
  }

  pub async fn task(&self, level: Level, task_id: &str, message: &str) {
    self.record(level, "task", message, Some(task_id)).await;
  }

  pub async fn get_logs(&self, limit: Option<usize>, level: Option<Level>) -> std::io::Result<Vec<JournalEntry>> {
    self.inner.lock().await.read(limit, level)
  }
}

fn echo(entry: &JournalEntry) {
  let task_id = entry.task_id.as_deref().unwrap_or("-");
  match entry.level {
    Level::Debug => tracing::debug!(component = %entry.component, task_id, "{}", entry.message),
    Level::Info => tracing::info!(component = %entry.component, task_id, "{}", entry.message),
    Level::Warn => tracing::warn!(component = %entry.component, task_id, "{}", entry.message),
    Level::Error => tracing::error!(component = %entry.component, task_id, "{}", entry.message),
  }
}
