//! Lookout REST Server
//!
//! HTTP API that searches archived camera tracks for a person and reports
//! when each camera first and last saw them.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use lookout::config::Config;
use lookout::server::startup::start_server;

#[derive(Parser)]
#[command(name = "lookout_server")]
#[command(about = "Lookout sighting search server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
  /// Path to a YAML config file
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Server bind address (overrides config)
  #[arg(long)]
  bind: Option<SocketAddr>,

  /// Camera archive root (overrides config)
  #[arg(long)]
  archive_root: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // RUST_LOG wins when set
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    if args.verbose {
      EnvFilter::new("lookout=debug,tower_http=debug,info")
    } else {
      EnvFilter::new("lookout=info,warn")
    }
  });

  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(bind) = args.bind {
    config.bind = bind;
  }
  if let Some(root) = args.archive_root {
    config.archive_root = root;
  }

  tracing::info!("Starting Lookout server v{}", env!("CARGO_PKG_VERSION"));
  tracing::info!("Archive root: {}", config.archive_root.display());

  start_server(config).await
}
