//! Job domain types for work items in the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Identifier;

/// Jobs are keyed by the same identifiers as every other durable entity.
pub type JobId = Identifier;

/// Current status of a job in its lifecycle.
///
/// ```text
/// pending --claim--> working --handler ok--> done
///    ^                  |
///    +---- recovery ----+----handler err---> error
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting to be claimed.
    #[default]
    Pending,
    /// Job has been claimed and is owned by the worker pool.
    Working,
    /// Job failed; the message is kept on the job.
    Error,
    /// Job completed successfully.
    Done,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Error | JobStatus::Done)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Working)
                | (JobStatus::Working, JobStatus::Pending)
                | (JobStatus::Working, JobStatus::Done)
                | (JobStatus::Working, JobStatus::Error)
        )
    }

    /// Get a simple status string for display and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Working => "working",
            JobStatus::Error => "error",
            JobStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "working" => Ok(JobStatus::Working),
            "error" => Ok(JobStatus::Error),
            "done" => Ok(JobStatus::Done),
            other => Err(format!("invalid job status: {other:?}")),
        }
    }
}

/// A job represents a unit of asynchronous work persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Type of job (used for routing to handlers).
    pub job_type: String,
    /// Current status.
    pub status: JobStatus,
    /// Failure message, only set when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Job payload, interpreted only by the matching handler.
    pub payload: serde_json::Value,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(id: JobId, job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            job_type: job_type.into(),
            status: JobStatus::Pending,
            error: None,
            payload,
            created_at: now,
            updated_at: now,
        }
    }
}
