// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Job handlers: the activator that turns a [`JobDescriptor`] into a running
//! job body (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jobsworth_core::{JobContext, JobDescriptor};
use thiserror::Error;

/// An error raised by a running job body.
///
/// `do_not_retry` lets a handler opt a failure out of the retry filter
/// entirely (e.g. a validation error that will never succeed on retry);
/// `exception` carries a free-form diagnostic (stack trace, cause chain)
/// kept separate from `message` so storage can index/display them
/// differently, mirroring the `Failed` state's own fields (§4.2).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub exception: Option<String>,
    pub do_not_retry: bool,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), exception: None, do_not_retry: false }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), exception: None, do_not_retry: true }
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }
}

/// Runs the body of one job type. Registered under [`JobHandler::job_type`]
/// in a [`JobHandlerRegistry`]; the worker pool looks the handler up by the
/// claimed job's descriptor and calls [`JobHandler::handle`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Must match [`JobDescriptor::job_type`] for every descriptor this
    /// handler should run.
    fn job_type(&self) -> &str;

    async fn handle(&self, descriptor: &JobDescriptor, ctx: JobContext) -> Result<(), HandlerError>;
}

/// Routes claimed jobs to the handler registered for their descriptor's
/// `job_type`.
#[derive(Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type().to_string(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        fn job_type(&self) -> &str {
            "demo.Echo"
        }

        async fn handle(&self, _descriptor: &JobDescriptor, _ctx: JobContext) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn registry_looks_up_by_job_type() {
        let mut registry = JobHandlerRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.get("demo.Echo").is_some());
        assert!(registry.get("demo.Missing").is_none());
    }

    #[test]
    fn handler_error_builders_set_expected_fields() {
        let err = HandlerError::permanent("bad input").with_exception("ValidationException");
        assert!(err.do_not_retry);
        assert_eq!(err.exception.as_deref(), Some("ValidationException"));
    }
}
