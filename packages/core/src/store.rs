//! Persistence interface consumed by the queue coordinator and workers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::{Job, JobId, JobStatus};

/// Errors surfaced by a [`JobStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable storage for job records.
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn JobStore>` across actors.
pub trait JobStore: Send + Sync + 'static {
    /// Create a `pending` job and return its identifier.
    fn insert(
        &self,
        job_type: String,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<JobId, StoreError>>;

    /// Atomically move up to `limit` of the oldest `pending` jobs to `working`.
    ///
    /// The returned jobs are ordered by creation time, oldest first, and carry
    /// their new status.
    fn claim_batch(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Job>, StoreError>>;

    /// Move every `working` job back to `pending`, returning how many moved.
    ///
    /// Only valid before the claim loop starts.
    fn recover_stuck(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Move one job from `working` to `done` or `error`.
    fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Fetch a job by identifier.
    fn get(&self, id: JobId) -> BoxFuture<'_, Result<Job, StoreError>>;

    /// Number of jobs per status.
    fn count_by_status(&self) -> BoxFuture<'_, Result<HashMap<JobStatus, u64>, StoreError>>;
}

/// Shared validation for [`JobStore::finish`] implementations.
pub fn check_finish(id: JobId, current: JobStatus, next: JobStatus) -> Result<(), StoreError> {
    if next.is_terminal() && current.can_transition_to(next) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            id,
            from: current,
            to: next,
        })
    }
}
