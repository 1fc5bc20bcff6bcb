mod common;

use std::sync::Arc;
use std::time::Duration;

use actors::{JobHandlerRegistry, Workforce, WorkforceConfig, job_handler};
use chrono::Utc;
use queue_core::{Job, JobId, JobStatus, JobStore};
use serde_json::json;

use common::setup_repo;

const WAIT: Duration = Duration::from_secs(10);

fn fast_config(workers: usize) -> WorkforceConfig {
    WorkforceConfig {
        max_workers: workers,
        idle_interval_ms: 20,
        backpressure_interval_ms: 10,
        retry_interval_ms: 10,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

fn handlers() -> JobHandlerRegistry {
    JobHandlerRegistry::new()
        .with(job_handler!("echo", |_payload| Ok(())))
        .with(job_handler!("fail", |_payload| Err("boom".to_string())))
}

async fn wait_for_status(store: &dyn JobStore, id: JobId, status: JobStatus) -> Job {
    tokio::time::timeout(WAIT, async {
        loop {
            let job = store.get(id).await.unwrap();
            if job.status == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job {id} never reached {status}"))
}

#[tokio::test]
async fn test_workers_survive_many_jobs() {
    let repo = Arc::new(setup_repo().await.unwrap());

    let mut echoes = Vec::new();
    for i in 0..12 {
        echoes.push(repo.insert("echo".into(), json!({ "n": i })).await.unwrap());
    }
    let fail = repo.insert("fail".into(), json!({})).await.unwrap();

    let mut workforce = Workforce::new(fast_config(3), repo.clone(), handlers());
    assert_eq!(workforce.start().await.unwrap(), 0);

    for id in echoes {
        let job = wait_for_status(repo.as_ref(), id, JobStatus::Done).await;
        assert_eq!(job.error, None);
    }
    let job = wait_for_status(repo.as_ref(), fail, JobStatus::Error).await;
    assert_eq!(job.error.as_deref(), Some("boom"));

    // Every worker recorded outcomes and is still taking jobs.
    assert_eq!(workforce.live_workers(), 3);

    let late = repo.insert("echo".into(), json!({})).await.unwrap();
    wait_for_status(repo.as_ref(), late, JobStatus::Done).await;
    assert_eq!(workforce.live_workers(), 3);

    let counts = repo.count_by_status().await.unwrap();
    assert_eq!(counts.get(&JobStatus::Done), Some(&13));
    assert_eq!(counts.get(&JobStatus::Error), Some(&1));

    workforce.stop().await;
}

#[tokio::test]
async fn test_start_recovers_claimed_rows() {
    let repo = Arc::new(setup_repo().await.unwrap());

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(repo.insert("echo".into(), json!({})).await.unwrap());
    }
    assert_eq!(repo.claim_batch(3, Utc::now()).await.unwrap().len(), 3);

    let mut workforce = Workforce::new(fast_config(2), repo.clone(), handlers());
    assert_eq!(workforce.start().await.unwrap(), 3);

    for id in ids {
        wait_for_status(repo.as_ref(), id, JobStatus::Done).await;
    }
    assert_eq!(workforce.live_workers(), 2);

    workforce.stop().await;
}
