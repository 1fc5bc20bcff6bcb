//! In-process [`JobStore`], used by tests and single-binary setups without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};

use crate::store::check_finish;
use crate::{IdAllocator, Job, JobId, JobStatus, JobStore, StoreError};

/// Mutex-guarded job table. Insertion order breaks ties between equal
/// creation timestamps.
#[derive(Debug)]
pub struct MemoryJobStore {
    ids: Arc<IdAllocator>,
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobStore {
    pub fn new(ids: Arc<IdAllocator>) -> Self {
        Self {
            ids,
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_now(&self, job_type: String, payload: serde_json::Value) -> JobId {
        let job = Job::new(self.ids.allocate(), job_type, payload);
        let id = job.id;
        self.jobs().push(job);
        id
    }

    fn claim_now(&self, limit: usize, now: DateTime<Utc>) -> Vec<Job> {
        let mut jobs = self.jobs();

        let mut pending: Vec<usize> = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status == JobStatus::Pending)
            .map(|(idx, _)| idx)
            .collect();
        pending.sort_by_key(|&idx| jobs[idx].created_at);
        pending.truncate(limit);

        pending
            .into_iter()
            .map(|idx| {
                let job = &mut jobs[idx];
                job.status = JobStatus::Working;
                job.updated_at = now;
                job.clone()
            })
            .collect()
    }

    fn recover_now(&self) -> u64 {
        let now = Utc::now();
        let mut recovered = 0;
        for job in self.jobs().iter_mut() {
            if job.status == JobStatus::Working {
                job.status = JobStatus::Pending;
                job.updated_at = now;
                recovered += 1;
            }
        }
        recovered
    }

    fn finish_now(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs();
        let job = jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(StoreError::NotFound(id))?;

        check_finish(id, job.status, status)?;
        job.status = status;
        job.error = if status == JobStatus::Error { error } else { None };
        job.updated_at = Utc::now();
        Ok(())
    }

    fn get_now(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs()
            .iter()
            .find(|job| job.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn count_now(&self) -> HashMap<JobStatus, u64> {
        let mut counts = HashMap::new();
        for job in self.jobs().iter() {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(Arc::new(IdAllocator::new()))
    }
}

impl JobStore for MemoryJobStore {
    fn insert(
        &self,
        job_type: String,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<JobId, StoreError>> {
        ready(Ok(self.insert_now(job_type, payload))).boxed()
    }

    fn claim_batch(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Job>, StoreError>> {
        ready(Ok(self.claim_now(limit, now))).boxed()
    }

    fn recover_stuck(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        ready(Ok(self.recover_now())).boxed()
    }

    fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        ready(self.finish_now(id, status, error)).boxed()
    }

    fn get(&self, id: JobId) -> BoxFuture<'_, Result<Job, StoreError>> {
        ready(self.get_now(id)).boxed()
    }

    fn count_by_status(&self) -> BoxFuture<'_, Result<HashMap<JobStatus, u64>, StoreError>> {
        ready(Ok(self.count_now())).boxed()
    }
}
