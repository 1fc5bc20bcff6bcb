//! Workforce tuning.

use std::time::Duration;

use serde::Deserialize;

/// Sizes and polling intervals for the coordinator and its workers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkforceConfig {
    /// Number of worker actors.
    pub max_workers: usize,
    /// Upper bound on claimed jobs held by the coordinator.
    pub channel_capacity: usize,
    /// Stop claiming while more than this many jobs are buffered.
    pub lookahead: usize,
    /// Maximum jobs taken from storage per claim.
    pub batch_size: usize,
    /// Delay before polling storage again after an empty claim.
    pub idle_interval_ms: u64,
    /// Delay while the buffer is above `lookahead`.
    pub backpressure_interval_ms: u64,
    /// Delay after a failed claim.
    pub retry_interval_ms: u64,
    /// Delay before an idle worker asks for work again.
    pub poll_interval_ms: u64,
    /// How long a worker waits on the coordinator for a reply.
    pub request_timeout_ms: u64,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            channel_capacity: 20,
            lookahead: 10,
            batch_size: 10,
            idle_interval_ms: 3000,
            backpressure_interval_ms: 1000,
            retry_interval_ms: 1000,
            poll_interval_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

impl WorkforceConfig {
    /// Reject sizes that would leave the pool unable to make progress.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_workers == 0 {
            return Err("max_workers must be at least 1");
        }
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be at least 1");
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1");
        }
        Ok(())
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn backpressure_interval(&self) -> Duration {
        Duration::from_millis(self.backpressure_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
