//! `catalog-workforce`: drains the job table with a pool of workers until Ctrl-C.

mod config;
mod handlers;

use std::sync::Arc;

use actors::Workforce;
use db::JobRepository;
use queue_core::IdAllocator;
use tracing_subscriber::EnvFilter;

use crate::config::HostConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = HostConfig::from_env()?;
    tracing::info!(
        endpoint = %config.db.endpoint,
        workers = config.workforce.max_workers,
        "Starting catalog workforce"
    );

    let db = db::open(config.db).await?;
    let store = Arc::new(JobRepository::new(db, Arc::new(IdAllocator::new())));

    let handlers = handlers::demo_handlers();
    tracing::info!(job_types = ?handlers.job_types(), "Registered handlers");

    let mut workforce = Workforce::new(config.workforce, store, handlers);
    workforce.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    workforce.stop().await;
    Ok(())
}
