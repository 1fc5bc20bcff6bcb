//! Demo handlers registered by the host binary.

use std::time::Duration;

use actors::{JobHandlerRegistry, job_handler};

pub fn demo_handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();

    // Demo: Echo handler
    handlers.register(job_handler!("echo", |payload| {
        tracing::info!(%payload, "Echo job");
        Ok(())
    }));

    // Demo: Sleep handler
    handlers.register(job_handler!("sleep", |payload| {
        let seconds = payload.get("seconds").and_then(|v| v.as_u64()).unwrap_or(5);
        tracing::info!(seconds, "Sleeping");
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        Ok(())
    }));

    // Demo: Failing handler
    handlers.register(job_handler!("fail", |payload| {
        let message = payload
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("Intentional failure")
            .to_string();
        Err(message)
    }));

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_demo_handlers() {
        let handlers = demo_handlers();

        let echo = handlers.get("echo").unwrap();
        assert_eq!(echo.handle(&json!({ "msg": "hi" })).await, Ok(()));

        let sleep = handlers.get("sleep").unwrap();
        assert_eq!(sleep.handle(&json!({ "seconds": 0 })).await, Ok(()));

        let fail = handlers.get("fail").unwrap();
        assert_eq!(
            fail.handle(&json!({ "message": "boom" })).await,
            Err("boom".to_string())
        );
        assert_eq!(
            fail.handle(&json!({})).await,
            Err("Intentional failure".to_string())
        );
    }
}
