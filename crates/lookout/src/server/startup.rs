//! REST server startup and configuration

use anyhow::{Context, Result};
use axum::{serve, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::archive::FsArchive;
use crate::config::Config;
use crate::embedder::RemoteEmbedder;
use crate::journal::TaskJournal;
use crate::server::{routing::create_router, AppState};
use crate::task::TaskOrchestrator;

const COMPONENT: &str = "lookout-server";

/// Wire the archive, embedder and journal named by `config` into app state
pub fn build_state(config: &Config) -> Result<AppState> {
  let journal = TaskJournal::new(&config.journal_path)
    .with_context(|| format!("Failed to open task journal {}", config.journal_path.display()))?;
  let archive = Arc::new(FsArchive::new(&config.archive_root));
  let mut embedder =
    RemoteEmbedder::new(&config.embedder_url, config.embedder_timeout()).context("Failed to build embedder client")?;
  if let Some(model) = &config.embedder_model {
    embedder = embedder.with_model(model);
  }
  let embedder = Arc::new(embedder);

  let orchestrator = TaskOrchestrator::from_config(config, archive, embedder).with_journal(journal.clone());

  Ok(AppState {
    orchestrator: Arc::new(orchestrator),
    journal,
    archive_root: config.archive_root.clone(),
    wait_timeout: config.wait_timeout(),
  })
}

/// Router with tracing and CORS layers applied
pub fn build_app(state: AppState, config: &Config) -> Router {
  create_router(state, config.max_body_bytes)
    .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
}

/// Start the REST server and serve until ctrl-c
pub async fn start_server(config: Config) -> Result<()> {
  let state = build_state(&config)?;
  let journal = state.journal.clone();

  if !config.archive_root.is_dir() {
    let message =
      format!("Archive root {} does not exist; every camera will be reported missing", config.archive_root.display());
    journal.warn(COMPONENT, &message).await;
  }

  let app = build_app(state, &config);

  let listener = TcpListener::bind(config.bind).await.with_context(|| format!("Failed to bind {}", config.bind))?;
  journal.info(COMPONENT, &format!("Server listening on {}", config.bind)).await;

  match serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
    Ok(()) => {
      journal.info(COMPONENT, "Server shutdown gracefully").await;
      Ok(())
    }
    Err(e) => {
      journal.error(COMPONENT, &format!("Server error: {e}")).await;
      Err(anyhow::anyhow!("Server error: {e}"))
    }
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("failed to listen for shutdown signal: {e}");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[tokio::test]
  async fn test_build_state_from_config() {
    let dir = TempDir::new().unwrap();
    let config = Config {
      archive_root: dir.path().join("archive"),
      journal_path: dir.path().join("logs").join("tasks.logs.jsonl"),
      embedder_model: Some("osnet".to_string()),
      wait_timeout_secs: 7,
      ..Config::default()
    };

    let state = build_state(&config).unwrap();

    assert!(config.journal_path.exists());
    assert_eq!(state.archive_root, config.archive_root);
    assert_eq!(state.wait_timeout, std::time::Duration::from_secs(7));
    assert_eq!(state.orchestrator.in_flight().await, 0);
  }
}
