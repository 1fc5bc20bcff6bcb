//! Actor system for the job queue.
//!
//! This crate provides the Ractor-based actors that drain a [`JobStore`]:
//!
//! # Architecture
//!
//! - `Coordinator` - Claims pending jobs in batches and buffers them
//! - `WorkerActor` - Pulls one job at a time and runs its handler
//! - `Workforce` - Recovery, startup and graceful shutdown of both
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobHandlerRegistry, Workforce, WorkforceConfig, job_handler};
//!
//! let handlers = JobHandlerRegistry::new().with(job_handler!("echo", |_payload| Ok(())));
//! let mut workforce = Workforce::new(WorkforceConfig::default(), store, handlers);
//! workforce.start().await?;
//! // ...
//! workforce.stop().await;
//! ```
//!
//! [`JobStore`]: queue_core::JobStore

mod config;
mod coordinator;
mod handler;
mod messages;
mod worker;
mod workforce;

pub use config::WorkforceConfig;
pub use coordinator::Coordinator;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, JobHandlerRegistry, Payload};
pub use messages::{CoordinatorMessage, WorkerMessage};
pub use worker::WorkerActor;
pub use workforce::{Workforce, WorkforceError};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
