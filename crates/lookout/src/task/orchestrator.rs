//! Task orchestration
//!
//! `submit` validates a query, registers a pending task and spawns its
//! worker. `wait` blocks the caller on the task's completion signal for a
//! bounded time. Workers are never cancelled: a caller that times out simply
//! stops listening, and the worker's eventual result is dropped when it
//! arrives.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use uuid::Uuid;

use super::registry::{Publication, TaskId, TaskRegistry};
use super::{MatchQuery, TaskState, ValidatedQuery};
use crate::archive::ArchiveReader;
use crate::config::{Aggregation, Config, TimezoneMode};
use crate::embedder::Embedder;
use crate::error::{RequestError, ScanError};
use crate::journal::{Level, TaskJournal};
use crate::matcher::{scan_cameras, CameraResult, MatchPolicy, ScanContext};

/// Matching behaviour shared by every task
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanSettings {
  pub policy: MatchPolicy,
  pub aggregation: Aggregation,
  pub timezone: TimezoneMode,
}

impl From<&Config> for ScanSettings {
  fn from(config: &Config) -> Self {
    Self {
      policy: MatchPolicy { threshold: config.distance_threshold, bypass_after: config.bypass_after },
      aggregation: config.aggregation,
      timezone: config.timezone,
    }
  }
}

/// Caller side of a submitted task
#[derive(Debug)]
pub struct TaskHandle {
  pub id: TaskId,
  done: oneshot::Receiver<()>,
}

/// What the caller gets back after waiting
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
  Completed { task_id: TaskId, results: Vec<CameraResult> },
  Failed { task_id: TaskId, error: String },
  TimedOut { task_id: TaskId },
}

impl TaskOutcome {
  pub fn task_id(&self) -> TaskId {
    match self {
      TaskOutcome::Completed { task_id, .. }
      | TaskOutcome::Failed { task_id, .. }
      | TaskOutcome::TimedOut { task_id } => *task_id,
    }
  }
}

/// Parts a worker needs, cloned out of the orchestrator per task
#[derive(Clone)]
struct Worker {
  archive: Arc<dyn ArchiveReader>,
  embedder: Arc<dyn Embedder>,
  settings: ScanSettings,
  registry: Arc<TaskRegistry>,
  permits: Option<Arc<Semaphore>>,
  journal: Option<TaskJournal>,
}

pub struct TaskOrchestrator {
  worker: Worker,
}

impl TaskOrchestrator {
  pub fn new(archive: Arc<dyn ArchiveReader>, embedder: Arc<dyn Embedder>, settings: ScanSettings) -> Self {
    Self {
      worker: Worker {
        archive,
        embedder,
        settings,
        registry: Arc::new(TaskRegistry::new()),
        permits: None,
        journal: None,
      },
    }
  }

  pub fn from_config(config: &Config, archive: Arc<dyn ArchiveReader>, embedder: Arc<dyn Embedder>) -> Self {
    let orchestrator = Self::new(archive, embedder, ScanSettings::from(config));
    match config.max_concurrent_tasks {
      Some(limit) => orchestrator.with_max_concurrent(limit),
      None => orchestrator,
    }
  }

  pub fn with_journal(mut self, journal: TaskJournal) -> Self {
    self.worker.journal = Some(journal);
    self
  }

  /// Bound the number of workers scanning at once; extra tasks stay pending
  /// until a permit frees up.
  pub fn with_max_concurrent(mut self, limit: usize) -> Self {
    self.worker.permits = Some(Arc::new(Semaphore::new(limit.max(1))));
    self
  }

  pub fn registry(&self) -> &TaskRegistry {
    &self.worker.registry
  }

  /// Tasks still holding a slot
  pub async fn in_flight(&self) -> usize {
    self.worker.registry.len().await
  }

  /// Validate a query and start its worker. Invalid queries create no task.
  pub async fn submit(&self, query: MatchQuery) -> Result<TaskHandle, RequestError> {
    let query = query.validate(self.worker.settings.timezone)?;

    let id = Uuid::new_v4();
    self.worker.registry.register(id).await;
    self
      .worker
      .log(Level::Info, id, &format!("submitted for {} camera(s), person {}", query.camera_ids.len(), query.person_id))
      .await;

    let (done_tx, done_rx) = oneshot::channel();
    let worker = self.worker.clone();
    tokio::spawn(async move {
      worker.run(id, query, done_tx).await;
    });

    Ok(TaskHandle { id, done: done_rx })
  }

  /// Wait up to `bound` for the task to finish and take its result
  pub async fn wait(&self, handle: TaskHandle, bound: Duration) -> TaskOutcome {
    let task_id = handle.id;

    if tokio::time::timeout(bound, handle.done).await.is_err() {
      let dropped = self.worker.registry.abandon(task_id).await;
      let message = if dropped {
        "caller timed out as the task finished; result dropped"
      } else {
        "caller timed out; task keeps running and its result will be discarded"
      };
      self.worker.log(Level::Warn, task_id, message).await;
      return TaskOutcome::TimedOut { task_id };
    }

    match self.worker.registry.take(task_id).await {
      Some(TaskState::Completed(results)) => TaskOutcome::Completed { task_id, results },
      Some(TaskState::Failed(error)) => TaskOutcome::Failed { task_id, error },
      Some(TaskState::Pending) | None => {
        TaskOutcome::Failed { task_id, error: "Task ended without publishing a result".to_string() }
      }
    }
  }

  /// Submit and wait in one step
  pub async fn run(&self, query: MatchQuery, bound: Duration) -> Result<TaskOutcome, RequestError> {
    let handle = self.submit(query).await?;
    Ok(self.wait(handle, bound).await)
  }
}

impl Worker {
  async fn log(&self, level: Level, task_id: TaskId, message: &str) {
    match &self.journal {
      Some(journal) => journal.task(level, &task_id.to_string(), message).await,
      None => tracing::debug!(task_id = %task_id, "{message}"),
    }
  }

  async fn run(self, id: TaskId, query: ValidatedQuery, done: oneshot::Sender<()>) {
    let _permit = match &self.permits {
      Some(permits) => permits.clone().acquire_owned().await.ok(),
      None => None,
    };

    let state = match AssertUnwindSafe(self.execute(query)).catch_unwind().await {
      Ok(Ok(results)) => {
        self.log(Level::Info, id, &format!("completed with {} camera result(s)", results.len())).await;
        TaskState::Completed(results)
      }
      Ok(Err(e)) => {
        self.log(Level::Error, id, &format!("failed: {e}")).await;
        TaskState::Failed(e.to_string())
      }
      Err(_) => {
        self.log(Level::Error, id, "worker panicked").await;
        TaskState::Failed("Task worker panicked".to_string())
      }
    };

    if self.registry.publish(id, state).await == Publication::Discarded {
      self.log(Level::Warn, id, "no caller is waiting; result discarded").await;
    }

    // Completion is signalled whatever the terminal state
    let _ = done.send(());
  }

  async fn execute(&self, query: ValidatedQuery) -> Result<Vec<CameraResult>, ScanError> {
    let embeddings = self.embedder.extract(&query.images).await?;

    let archive = Arc::clone(&self.archive);
    let embedder = Arc::clone(&self.embedder);
    let settings = self.settings;

    tokio::task::spawn_blocking(move || {
      let ctx = ScanContext {
        archive: archive.as_ref(),
        embedder: embedder.as_ref(),
        query: &embeddings,
        window: query.window,
        policy: settings.policy,
        aggregation: settings.aggregation,
        person_id: &query.person_id,
      };
      scan_cameras(&ctx, &query.camera_ids)
    })
    .await
    .map_err(|e| ScanError::Worker(e.to_string()))?
  }
}
