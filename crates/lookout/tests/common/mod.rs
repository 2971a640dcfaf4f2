#![allow(dead_code)]

use async_trait::async_trait;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use lookout::archive::{Embedding, FsArchive, Record, TrackFile};
use lookout::config::TimezoneMode;
use lookout::embedder::Embedder;
use lookout::error::EmbedError;
use lookout::journal::TaskJournal;
use lookout::task::{MatchQuery, ScanSettings, TaskOrchestrator};

/// 2023-11-14 22:13:20 UTC
pub const WINDOW_START: i64 = 1_700_000_000;
pub const WINDOW_END: i64 = WINDOW_START + 3600;

/// Reads the distance straight out of the candidate's first component, so
/// tests can place records at exact distances from the query.
pub struct EncodedDistance {
  pub delay: Option<Duration>,
}

#[async_trait]
impl Embedder for EncodedDistance {
  async fn extract(&self, images: &[Vec<u8>]) -> Result<Vec<Embedding>, EmbedError> {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    Ok(images.iter().map(|_| vec![0.0]).collect())
  }

  fn distance(&self, query: &[Embedding], candidate: &[f32]) -> Result<Vec<f32>, EmbedError> {
    Ok(query.iter().map(|_| candidate[0]).collect())
  }
}

pub struct TestArchive {
  pub dir: TempDir,
}

impl TestArchive {
  pub fn new() -> Self {
    Self { dir: TempDir::new().unwrap() }
  }

  pub fn root(&self) -> &Path {
    self.dir.path()
  }

  pub fn camera(&self, camera_id: &str) -> &Self {
    fs::create_dir_all(self.root().join(camera_id)).unwrap();
    self
  }

  pub fn track(&self, camera_id: &str, track_id: &str, records: &[(f32, &str)]) -> &Self {
    self.camera(camera_id);
    let records = records.iter().map(|(distance, ts)| record(*distance, ts)).collect();
    let body = serde_json::to_vec(&TrackFile::new(records)).unwrap();
    fs::write(self.root().join(camera_id).join(track_id), body).unwrap();
    self
  }

  pub fn reader(&self) -> Arc<FsArchive> {
    Arc::new(FsArchive::new(self.root()))
  }
}

pub fn record(distance: f32, timestamp: &str) -> Record {
  Record { embedding: vec![distance], timestamp: timestamp.to_string() }
}

/// Archive timestamp `minutes` after the window start
pub fn ts(minutes: u32) -> String {
  format!("2023-11-14_{:02}-{:02}-20-000", 22 + (13 + minutes) / 60, (13 + minutes) % 60)
}

pub fn settings() -> ScanSettings {
  ScanSettings { timezone: TimezoneMode::Utc, ..ScanSettings::default() }
}

pub fn orchestrator(archive: &TestArchive, delay: Option<Duration>) -> TaskOrchestrator {
  TaskOrchestrator::new(archive.reader(), Arc::new(EncodedDistance { delay }), settings())
}

pub fn silent_journal(dir: &Path) -> TaskJournal {
  TaskJournal::new_with_silent(dir.join("tasks.logs.jsonl"), true).unwrap()
}

pub fn query(cameras: &[&str]) -> MatchQuery {
  MatchQuery {
    images: vec![b"reference".to_vec()],
    camera_ids: cameras.iter().map(|c| c.to_string()).collect(),
    person_id: "person-7".to_string(),
    start_epoch: WINDOW_START,
    end_epoch: WINDOW_END,
  }
}
