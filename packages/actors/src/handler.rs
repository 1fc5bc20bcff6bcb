//! Job handler trait and registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Opaque job payload, interpreted only by its handler.
pub type Payload = serde_json::Value;

/// Result type for job handlers. The error string is stored on the job.
pub type HandlerResult = Result<(), String>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for job handlers.
///
/// Implement this trait to define how jobs of a specific type are processed.
pub trait JobHandler: Send + Sync + 'static {
    /// The job type this handler processes.
    fn job_type(&self) -> &str;

    /// Process one job payload.
    fn handle(&self, payload: &Payload) -> HandlerFuture;
}

/// Registry for job handlers.
///
/// Maps job types to their handlers for dynamic dispatch.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job type, replacing any previous one.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let job_type = handler.job_type().to_string();
        self.handlers.insert(job_type, Arc::new(handler));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H: JobHandler>(mut self, handler: H) -> Self {
        self.register(handler);
        self
    }

    /// Get a handler for a job type.
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Check if a handler exists for a job type.
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// List all registered job types.
    pub fn job_types(&self) -> Vec<&str> {
        self.handlers.keys().map(|s| s.as_str()).collect()
    }
}

impl std::fmt::Debug for JobHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandlerRegistry")
            .field("job_types", &self.job_types())
            .finish()
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&Payload) -> HandlerFuture + Send + Sync + 'static,
{
    job_type: String,
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Payload) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(job_type: impl Into<String>, handler: F) -> Self {
        Self {
            job_type: job_type.into(),
            handler,
        }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Payload) -> HandlerFuture + Send + Sync + 'static,
{
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn handle(&self, payload: &Payload) -> HandlerFuture {
        (self.handler)(payload)
    }
}

/// Helper macro for creating job handlers from async blocks.
///
/// The payload is cloned into the future, so the body may hold it across
/// `.await` points.
///
/// ```ignore
/// let echo = job_handler!("echo", |payload| {
///     tracing::info!(%payload, "echo");
///     Ok(())
/// });
/// ```
#[macro_export]
macro_rules! job_handler {
    ($job_type:expr, |$payload:ident| $body:expr) => {
        $crate::FnHandler::new($job_type, |$payload: &$crate::Payload| {
            let $payload = $payload.clone();
            let fut: $crate::HandlerFuture = Box::pin(async move { $body });
            fut
        })
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_dispatch() {
        let registry = JobHandlerRegistry::new()
            .with(crate::job_handler!("echo", |_payload| Ok(())))
            .with(crate::job_handler!("fail", |payload| {
                Err(payload["msg"].as_str().unwrap_or_default().to_string())
            }));

        assert!(registry.has_handler("echo"));
        assert!(!registry.has_handler("scale_img"));
        assert!(registry.get("scale_img").is_none());

        let mut types = registry.job_types();
        types.sort();
        assert_eq!(types, vec!["echo", "fail"]);

        let payload = serde_json::json!({ "msg": "boom" });
        let echo = registry.get("echo").unwrap();
        assert_eq!(echo.handle(&payload).await, Ok(()));

        let fail = registry.get("fail").unwrap();
        assert_eq!(fail.handle(&payload).await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_register_replaces_existing_handler() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(crate::job_handler!("echo", |_payload| Err("old".to_string())));
        registry.register(crate::job_handler!("echo", |_payload| Ok(())));

        let handler = registry.get("echo").unwrap();
        assert_eq!(handler.handle(&Payload::Null).await, Ok(()));
        assert_eq!(registry.job_types().len(), 1);
    }
}
