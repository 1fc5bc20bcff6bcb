//! Coordinator actor: claims pending jobs from storage and buffers them for workers.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use queue_core::{Job, JobStore};
use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr};

use crate::config::WorkforceConfig;
use crate::messages::CoordinatorMessage;

/// Coordinator actor arguments.
pub struct CoordinatorArgs {
    pub store: Arc<dyn JobStore>,
    pub config: WorkforceConfig,
}

/// State for the coordinator actor.
pub struct CoordinatorState {
    store: Arc<dyn JobStore>,
    config: WorkforceConfig,
    /// Claimed jobs, oldest first. Never longer than `channel_capacity`.
    buffer: VecDeque<Job>,
}

impl CoordinatorState {
    /// How many jobs the next claim may take without overflowing the buffer.
    fn claim_limit(&self) -> usize {
        self.config
            .channel_capacity
            .saturating_sub(self.buffer.len())
            .min(self.config.batch_size)
    }
}

/// Send `message` to `actor` once `delay` has elapsed.
///
/// Dropped silently if the actor has stopped in the meantime.
pub(crate) fn send_after<M: ractor::Message>(actor: &ActorRef<M>, delay: Duration, message: M) {
    let actor = actor.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = actor.send_message(message);
    });
}

/// Coordinator actor that owns the claim loop and the delivery buffer.
pub struct Coordinator;

impl Actor for Coordinator {
    type Msg = CoordinatorMessage;
    type State = CoordinatorState;
    type Arguments = CoordinatorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            capacity = args.config.channel_capacity,
            batch_size = args.config.batch_size,
            "Starting coordinator"
        );

        myself.send_message(CoordinatorMessage::Claim)?;

        Ok(CoordinatorState {
            store: args.store,
            buffer: VecDeque::with_capacity(args.config.channel_capacity),
            config: args.config,
        })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if !state.buffer.is_empty() {
            tracing::info!(
                count = state.buffer.len(),
                "Coordinator stopped with buffered jobs; they stay working until recovery"
            );
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CoordinatorMessage::Claim => {
                if state.buffer.len() > state.config.lookahead {
                    send_after(
                        &myself,
                        state.config.backpressure_interval(),
                        CoordinatorMessage::Claim,
                    );
                    return Ok(());
                }

                let limit = state.claim_limit();
                if limit == 0 {
                    send_after(
                        &myself,
                        state.config.backpressure_interval(),
                        CoordinatorMessage::Claim,
                    );
                    return Ok(());
                }

                match state.store.claim_batch(limit, Utc::now()).await {
                    Ok(jobs) if jobs.is_empty() => {
                        tracing::debug!("No pending jobs");
                        send_after(
                            &myself,
                            state.config.idle_interval(),
                            CoordinatorMessage::Claim,
                        );
                    }
                    Ok(jobs) => {
                        tracing::info!(count = jobs.len(), "Claimed jobs");
                        state.buffer.extend(jobs);
                        myself.send_message(CoordinatorMessage::Claim)?;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to claim jobs");
                        send_after(
                            &myself,
                            state.config.retry_interval(),
                            CoordinatorMessage::Claim,
                        );
                    }
                }
            }

            CoordinatorMessage::RequestJob { reply } => {
                let job = state.buffer.pop_front();
                // A requester that timed out leaves the job for the next one.
                if let Err(MessagingErr::SendErr(Some(job))) = reply.send(job) {
                    state.buffer.push_front(job);
                }
            }

            CoordinatorMessage::Buffered { reply } => {
                let _ = reply.send(state.buffer.len());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_core::MemoryJobStore;

    fn state(capacity: usize, batch: usize, buffered: usize) -> CoordinatorState {
        let config = WorkforceConfig {
            channel_capacity: capacity,
            batch_size: batch,
            ..Default::default()
        };
        let mut buffer = VecDeque::new();
        for _ in 0..buffered {
            buffer.push_back(queue_core::Job::new(
                queue_core::IdAllocator::new().allocate(),
                "echo",
                serde_json::Value::Null,
            ));
        }
        CoordinatorState {
            store: Arc::new(MemoryJobStore::default()),
            config,
            buffer,
        }
    }

    #[test]
    fn test_claim_limit_respects_capacity() {
        assert_eq!(state(20, 10, 0).claim_limit(), 10);
        assert_eq!(state(20, 10, 15).claim_limit(), 5);
        assert_eq!(state(20, 10, 20).claim_limit(), 0);
        assert_eq!(state(5, 10, 0).claim_limit(), 5);
    }
}
