//! Lifecycle of the coordinator and its worker pool.

use std::sync::Arc;

use queue_core::{JobStore, StoreError};
use ractor::concurrency::JoinHandle;
use ractor::rpc::CallResult;
use ractor::{Actor, ActorRef, SpawnErr};
use thiserror::Error;

use crate::config::WorkforceConfig;
use crate::coordinator::{Coordinator, CoordinatorArgs};
use crate::handler::JobHandlerRegistry;
use crate::messages::{CoordinatorMessage, WorkerMessage};
use crate::worker::{WorkerActor, WorkerArgs};

/// Errors from starting a [`Workforce`].
#[derive(Debug, Error)]
pub enum WorkforceError {
    #[error("Workforce is already running")]
    AlreadyRunning,
    #[error("Invalid workforce config: {0}")]
    InvalidConfig(&'static str),
    #[error("Failed to recover stuck jobs: {0}")]
    Recovery(#[from] StoreError),
    #[error("Failed to spawn actor: {0}")]
    Spawn(#[from] SpawnErr),
}

struct Running {
    coordinator: ActorRef<CoordinatorMessage>,
    coordinator_handle: JoinHandle<()>,
    workers: Vec<(ActorRef<WorkerMessage>, JoinHandle<()>)>,
}

/// Owns the coordinator and worker actors for one job store.
pub struct Workforce {
    config: WorkforceConfig,
    store: Arc<dyn JobStore>,
    handlers: Arc<JobHandlerRegistry>,
    running: Option<Running>,
}

impl Workforce {
    pub fn new(
        config: WorkforceConfig,
        store: Arc<dyn JobStore>,
        handlers: JobHandlerRegistry,
    ) -> Self {
        Self {
            config,
            store,
            handlers: Arc::new(handlers),
            running: None,
        }
    }

    pub fn config(&self) -> &WorkforceConfig {
        &self.config
    }

    /// Validate the config, recover stuck jobs, then spawn the coordinator and workers.
    ///
    /// Returns how many `working` jobs were reset to `pending`.
    pub async fn start(&mut self) -> Result<u64, WorkforceError> {
        if self.running.is_some() {
            return Err(WorkforceError::AlreadyRunning);
        }
        self.config.validate().map_err(WorkforceError::InvalidConfig)?;

        let recovered = self.store.recover_stuck().await?;
        tracing::info!(count = recovered, "Recovered stuck jobs");

        let (coordinator, coordinator_handle) = Actor::spawn(
            None,
            Coordinator,
            CoordinatorArgs {
                store: self.store.clone(),
                config: self.config.clone(),
            },
        )
        .await?;

        let mut running = Running {
            coordinator: coordinator.clone(),
            coordinator_handle,
            workers: Vec::with_capacity(self.config.max_workers),
        };

        for worker_id in 0..self.config.max_workers {
            let args = WorkerArgs {
                worker_id,
                coordinator: coordinator.clone(),
                store: self.store.clone(),
                handlers: self.handlers.clone(),
                config: self.config.clone(),
            };

            match Actor::spawn(None, WorkerActor, args).await {
                Ok(worker) => running.workers.push(worker),
                Err(e) => {
                    shutdown(running).await;
                    return Err(e.into());
                }
            }
        }

        tracing::info!(workers = self.config.max_workers, "Workforce started");
        self.running = Some(running);

        Ok(recovered)
    }

    /// Stop claiming, let every worker finish its current job, and wait for
    /// all actors to exit.
    ///
    /// There is no timeout: a handler that never returns blocks this call.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            tracing::info!("Stopping workforce");
            shutdown(running).await;
            tracing::info!("Workforce stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Number of worker actors that have not exited.
    pub fn live_workers(&self) -> usize {
        self.running.as_ref().map_or(0, |running| {
            running
                .workers
                .iter()
                .filter(|(_, handle)| !handle.is_finished())
                .count()
        })
    }

    /// Number of claimed jobs waiting in the coordinator, if it is reachable.
    pub async fn buffered(&self) -> Option<usize> {
        let running = self.running.as_ref()?;
        let result = ractor::rpc::call(
            &running.coordinator,
            |reply| CoordinatorMessage::Buffered { reply },
            Some(self.config.request_timeout()),
        )
        .await;

        match result {
            Ok(CallResult::Success(count)) => Some(count),
            _ => None,
        }
    }
}

async fn shutdown(running: Running) {
    running.coordinator.stop(None);
    for (worker, _) in &running.workers {
        worker.stop(None);
    }

    if let Err(e) = running.coordinator_handle.await {
        tracing::warn!(error = %e, "Coordinator task failed");
    }
    for (_, handle) in running.workers {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Worker task failed");
        }
    }
}
