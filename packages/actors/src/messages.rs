//! Message types for actor communication.

use queue_core::Job;
use ractor::RpcReplyPort;

/// Messages for the Coordinator.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// Run one pass of the claim loop.
    Claim,

    /// Hand the oldest buffered job to a worker, if any.
    RequestJob { reply: RpcReplyPort<Option<Job>> },

    /// Number of claimed jobs waiting for a worker.
    Buffered { reply: RpcReplyPort<usize> },
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Ask the coordinator for a job and process it.
    Poll,
}
