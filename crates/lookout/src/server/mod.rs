//! REST API for the sighting search service
//!
//! One match endpoint plus the status, version and logs endpoints. Uses
//! axum for routing and schemars for the response schemas.

pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod startup;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::journal::TaskJournal;
use crate::task::TaskOrchestrator;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
  pub orchestrator: Arc<TaskOrchestrator>,
  pub journal: TaskJournal,
  pub archive_root: PathBuf,
  /// How long a match request waits for its task
  pub wait_timeout: Duration,
}
