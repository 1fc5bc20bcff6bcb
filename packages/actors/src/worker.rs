//! Worker actor for executing jobs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use queue_core::{Job, JobStatus, JobStore, StoreError};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::config::WorkforceConfig;
use crate::coordinator::send_after;
use crate::handler::{HandlerResult, JobHandlerRegistry};
use crate::messages::{CoordinatorMessage, WorkerMessage};

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: usize,
    pub coordinator: ActorRef<CoordinatorMessage>,
    pub store: Arc<dyn JobStore>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub config: WorkforceConfig,
}

/// State for the worker actor.
pub struct WorkerState {
    worker_id: usize,
    coordinator: ActorRef<CoordinatorMessage>,
    store: Arc<dyn JobStore>,
    handlers: Arc<JobHandlerRegistry>,
    config: WorkforceConfig,
}

impl WorkerState {
    /// Run the handler for `job` and turn every failure into a message.
    async fn execute(&self, job: &Job) -> HandlerResult {
        let Some(handler) = self.handlers.get(&job.job_type) else {
            return Err(format!("unknown job type: {}", job.job_type));
        };

        let run = async { handler.handle(&job.payload).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Err(message)) if message.is_empty() => Err("handler failed".to_string()),
            Ok(result) => result,
            Err(panic) => Err(format!("handler panicked: {}", panic_message(&*panic))),
        }
    }

    /// Process one job and record its terminal status.
    async fn process(&self, job: Job) -> Result<(), StoreError> {
        tracing::debug!(
            worker_id = self.worker_id,
            job_id = %job.id,
            job_type = %job.job_type,
            "Processing job"
        );

        match self.execute(&job).await {
            Ok(()) => {
                self.store.finish(job.id, JobStatus::Done, None).await?;
                tracing::info!(
                    worker_id = self.worker_id,
                    job_id = %job.id,
                    job_type = %job.job_type,
                    "Job done"
                );
            }
            Err(message) => {
                tracing::warn!(
                    worker_id = self.worker_id,
                    job_id = %job.id,
                    job_type = %job.job_type,
                    error = %message,
                    "Job failed"
                );
                self.store
                    .finish(job.id, JobStatus::Error, Some(message))
                    .await?;
            }
        }

        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Worker actor that executes jobs one at a time.
///
/// Jobs run inside the message handler, so a stop request only takes effect
/// between jobs.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(worker_id = args.worker_id, "Starting worker");

        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerState {
            worker_id: args.worker_id,
            coordinator: args.coordinator,
            store: args.store,
            handlers: args.handlers,
            config: args.config,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(worker_id = state.worker_id, "Worker exited");
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                let result = ractor::rpc::call(
                    &state.coordinator,
                    |reply| CoordinatorMessage::RequestJob { reply },
                    Some(state.config.request_timeout()),
                )
                .await;

                match result {
                    Ok(CallResult::Success(Some(job))) => {
                        let job_id = job.id;
                        if let Err(e) = state.process(job).await {
                            tracing::error!(
                                worker_id = state.worker_id,
                                job_id = %job_id,
                                error = %e,
                                "Failed to record job outcome; stopping worker"
                            );
                            myself.stop(Some(format!("failed to record job {job_id}: {e}")));
                            return Ok(());
                        }
                        myself.send_message(WorkerMessage::Poll)?;
                    }
                    Ok(CallResult::Success(None)) => {
                        send_after(&myself, state.config.poll_interval(), WorkerMessage::Poll);
                    }
                    Ok(CallResult::Timeout) | Ok(CallResult::SenderError) | Err(_) => {
                        tracing::debug!(
                            worker_id = state.worker_id,
                            "Coordinator unavailable"
                        );
                        send_after(&myself, state.config.poll_interval(), WorkerMessage::Poll);
                    }
                }
            }
        }

        Ok(())
    }
}
