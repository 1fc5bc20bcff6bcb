use std::sync::Arc;

use queue_core::IdAllocator;

use db::{DbConfig, DbError, JobRepository};

/// Every call opens its own `mem://` datastore, so tests never share rows.
pub async fn setup_repo() -> Result<JobRepository, DbError> {
    let db = db::open(DbConfig::memory()).await?;
    Ok(JobRepository::new(db, Arc::new(IdAllocator::new())))
}
