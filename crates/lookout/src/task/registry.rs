//! In-flight task bookkeeping
//!
//! Each task owns one slot from submission until its result is taken by the
//! caller or discarded. All structural changes happen under one lock.

use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{TaskState, TaskStatus};

pub type TaskId = Uuid;

#[derive(Debug)]
struct TaskSlot {
  state: TaskState,
  /// The caller stopped waiting; a late result is dropped on arrival
  abandoned: bool,
}

/// What happened to a worker's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publication {
  Stored,
  /// The caller already gave up, or the slot is gone
  Discarded,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
  slots: Mutex<HashMap<TaskId, TaskSlot>>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn register(&self, id: TaskId) {
    self.slots.lock().await.insert(id, TaskSlot { state: TaskState::Pending, abandoned: false });
  }

  /// Move a pending task to its terminal state. Terminal states are final: a
  /// second publication for the same task is discarded.
  pub async fn publish(&self, id: TaskId, state: TaskState) -> Publication {
    let mut slots = self.slots.lock().await;
    let Some(slot) = slots.get_mut(&id) else {
      return Publication::Discarded;
    };

    if slot.abandoned {
      slots.remove(&id);
      return Publication::Discarded;
    }
    if slot.state.status() != TaskStatus::Pending {
      return Publication::Discarded;
    }

    slot.state = state;
    Publication::Stored
  }

  /// Read and remove a task's state
  pub async fn take(&self, id: TaskId) -> Option<TaskState> {
    self.slots.lock().await.remove(&id).map(|slot| slot.state)
  }

  /// Mark a task as no longer awaited. Returns true when a finished result
  /// was already present and has been dropped.
  pub async fn abandon(&self, id: TaskId) -> bool {
    let mut slots = self.slots.lock().await;
    match slots.get_mut(&id) {
      Some(slot) if slot.state.status() == TaskStatus::Pending => {
        slot.abandoned = true;
        false
      }
      Some(_) => {
        slots.remove(&id);
        true
      }
      None => false,
    }
  }

  pub async fn status(&self, id: TaskId) -> Option<TaskStatus> {
    self.slots.lock().await.get(&id).map(|slot| slot.state.status())
  }

  /// Number of slots still held (running tasks plus unread results)
  pub async fn len(&self) -> usize {
    self.slots.lock().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}
