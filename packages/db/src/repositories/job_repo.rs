//! Job repository implementing the durable [`JobStore`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use queue_core::{IdAllocator, Job, JobId, JobStatus, JobStore, StoreError};
use serde::{Deserialize, Serialize};
use surrealdb::sql::{Datetime, Thing};

use crate::{Database, DbError};

const TABLE: &str = "job";

/// Repository for job persistence operations.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
    ids: Arc<IdAllocator>,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct JobRecord {
    id: Thing,
    job_type: String,
    status: JobStatus,
    error: Option<String>,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn into_job(self) -> Result<Job, DbError> {
        let raw = self.id.id.to_raw();
        let id = raw
            .parse::<JobId>()
            .map_err(|e| DbError::Corrupt(format!("record id {raw:?}: {e}")))?;

        Ok(Job {
            id,
            job_type: self.job_type,
            status: self.status,
            error: self.error,
            payload: self.payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Struct for creating jobs - omits datetime fields to use SurrealDB defaults.
#[derive(Debug, Serialize)]
struct JobCreate {
    job_type: String,
    status: JobStatus,
    payload: serde_json::Value,
}

/// Row shape of `RETURN id`.
#[derive(Debug, Deserialize)]
struct RecordRef {
    id: Thing,
}

impl RecordRef {
    fn key(&self) -> String {
        self.id.id.to_raw()
    }
}

fn into_jobs(records: Vec<JobRecord>) -> Result<Vec<Job>, DbError> {
    records.into_iter().map(JobRecord::into_job).collect()
}

impl JobRepository {
    pub fn new(db: Database, ids: Arc<IdAllocator>) -> Self {
        Self { db, ids }
    }

    /// The underlying connection.
    pub fn db(&self) -> &Database {
        &self.db
    }

    async fn create(&self, job_type: String, payload: serde_json::Value) -> Result<JobId, DbError> {
        let id = self.ids.allocate();
        let data = JobCreate {
            job_type,
            status: JobStatus::Pending,
            payload,
        };

        let record: Option<JobRecord> = self
            .db
            .create((TABLE, id.to_string()))
            .content(data)
            .await?;

        record
            .map(|_| id)
            .ok_or_else(|| DbError::Query("Failed to create job".into()))
    }

    async fn select(&self, id: JobId) -> Result<Option<Job>, DbError> {
        let record: Option<JobRecord> = self.db.select((TABLE, id.to_string())).await?;
        record.map(JobRecord::into_job).transpose()
    }

    async fn claim(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<Job>, DbError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // Select and flip in one transaction; the status guard keeps a job
        // from being claimed twice.
        let mut result = self
            .db
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $candidates = (
                    SELECT id, created_at FROM job
                    WHERE status = "pending"
                    ORDER BY created_at ASC
                    LIMIT $limit
                );
                LET $ids = $candidates.id;
                UPDATE $ids SET status = "working", updated_at = $now
                WHERE status = "pending"
                RETURN AFTER;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("limit", limit as i64))
            .bind(("now", Datetime::from(now)))
            .await?;

        // The UPDATE is the last statement that produces output.
        let last = result.num_statements().saturating_sub(1);
        let records: Vec<JobRecord> = result.take(last)?;
        let mut jobs = into_jobs(records)?;
        jobs.sort_by_key(|job| (job.created_at, job.id));

        Ok(jobs)
    }

    async fn recover(&self) -> Result<u64, DbError> {
        let mut result = self
            .db
            .query(
                r#"
                UPDATE job SET status = "pending", updated_at = time::now()
                WHERE status = "working"
                RETURN id
                "#,
            )
            .await?;

        let moved: Vec<RecordRef> = result.take(0)?;
        for record in &moved {
            tracing::debug!(job_id = %record.key(), "Reset working job to pending");
        }
        Ok(moved.len() as u64)
    }

    async fn complete(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        if status.is_terminal() {
            let error = if status == JobStatus::Error { error } else { None };

            let mut result = self
                .db
                .query(
                    r#"
                    UPDATE type::thing('job', $id)
                    SET status = $status, error = $error, updated_at = time::now()
                    WHERE status = "working"
                    RETURN id
                    "#,
                )
                .bind(("id", id.to_string()))
                .bind(("status", status.as_str().to_string()))
                .bind(("error", error))
                .await
                .map_err(DbError::from)?;

            let updated: Vec<RecordRef> = result.take(0).map_err(DbError::from)?;
            let key = id.to_string();
            if updated.iter().any(|record| record.key() == key) {
                return Ok(());
            }
        }

        // Nothing moved: the job is missing or not working.
        let current = self.select(id).await?.ok_or(StoreError::NotFound(id))?;
        Err(StoreError::InvalidTransition {
            id,
            from: current.status,
            to: status,
        })
    }

    async fn counts(&self) -> Result<HashMap<JobStatus, u64>, DbError> {
        #[derive(Deserialize)]
        struct StatusCount {
            status: String,
            count: i64,
        }

        let mut result = self
            .db
            .query("SELECT status, count() AS count FROM job GROUP BY status")
            .await?;

        let rows: Vec<StatusCount> = result.take(0)?;

        let mut map = HashMap::new();
        for row in rows {
            let status = row
                .status
                .parse::<JobStatus>()
                .map_err(DbError::Corrupt)?;
            map.insert(status, row.count.max(0) as u64);
        }

        Ok(map)
    }
}

impl JobStore for JobRepository {
    fn insert(
        &self,
        job_type: String,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, Result<JobId, StoreError>> {
        async move { Ok(self.create(job_type, payload).await?) }.boxed()
    }

    fn claim_batch(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Job>, StoreError>> {
        async move { Ok(self.claim(limit, now).await?) }.boxed()
    }

    fn recover_stuck(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        async move { Ok(self.recover().await?) }.boxed()
    }

    fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        error: Option<String>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        self.complete(id, status, error).boxed()
    }

    fn get(&self, id: JobId) -> BoxFuture<'_, Result<Job, StoreError>> {
        async move { self.select(id).await?.ok_or(StoreError::NotFound(id)) }.boxed()
    }

    fn count_by_status(&self) -> BoxFuture<'_, Result<HashMap<JobStatus, u64>, StoreError>> {
        async move { Ok(self.counts().await?) }.boxed()
    }
}
