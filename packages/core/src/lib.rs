//! Core domain types for the job queue system.
//!
//! This crate contains shared types used across all packages:
//! - Identifier and IdAllocator for time-ordered job keys
//! - Job and JobStatus for work items
//! - JobStore, the persistence seam, with an in-memory implementation

mod id;
mod job;
mod memory;
pub mod store;

pub use id::{
    Clock, ENCODED_LEN, IdAllocator, IdError, Identifier, RANDOM_BITS, RandomSource, SystemClock,
    TICK_BITS,
};
pub use job::{Job, JobId, JobStatus};
pub use memory::MemoryJobStore;
pub use store::{JobStore, StoreError, check_finish};
