// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! A single demo [`JobHandler`] the `serve` command registers by default,
//! so `jobsworth enqueue-demo` has something to run without the operator
//! writing their own handler first.

use async_trait::async_trait;
use jobsworth_core::{JobContext, JobDescriptor};
use jobsworth_server::{HandlerError, JobHandler};
use tracing::info;

pub const DEMO_JOB_TYPE: &str = "jobsworth.cli.Greeter";

/// Prints `args[0]` (a name) as a greeting, reporting progress through the
/// job's [`JobContext`] along the way.
pub struct GreeterHandler;

#[async_trait]
impl JobHandler for GreeterHandler {
    fn job_type(&self) -> &str {
        DEMO_JOB_TYPE
    }

    async fn handle(&self, descriptor: &JobDescriptor, ctx: JobContext) -> Result<(), HandlerError> {
        let name = descriptor
            .args
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or("world")
            .to_string();
        ctx.report_progress("greeting");
        info!(job_id = %ctx.job_id(), %name, "hello from the demo handler");
        ctx.set_metadata("greeted", &name);
        Ok(())
    }
}

/// Build the descriptor `jobsworth enqueue-demo <name>` submits.
pub fn greet_descriptor(name: &str) -> JobDescriptor {
    JobDescriptor::new(DEMO_JOB_TYPE, "greet")
        .arg("String", &name.to_string())
        .unwrap_or_else(|_| JobDescriptor::new(DEMO_JOB_TYPE, "greet"))
        .build()
}
