// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! `jobsworth status` — print the current job-count breakdown by state.

use std::sync::Arc;

use anyhow::Result;
use jobsworth_client::JobScheduler;
use jobsworth_storage::{JobStats, SimpleStorageProvider};

pub async fn run(json: bool) -> Result<()> {
    // A standalone `status` invocation has no other process to talk to — the
    // storage provider is created fresh, so this mostly demonstrates the
    // `JobScheduler::job_stats` call site against an empty queue. A real
    // deployment wires the CLI against the same provider its servers use.
    let scheduler = JobScheduler::new(Arc::new(SimpleStorageProvider::new()));
    let stats = scheduler.job_stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats_json(&stats))?);
    } else {
        println!("scheduled:  {}", stats.scheduled);
        println!("enqueued:   {}", stats.enqueued);
        println!("processing: {}", stats.processing);
        println!("succeeded:  {}", stats.succeeded);
        println!("failed:     {}", stats.failed);
        println!("deleted:    {}", stats.deleted);
    }
    Ok(())
}

fn stats_json(stats: &JobStats) -> serde_json::Value {
    serde_json::json!({
        "scheduled": stats.scheduled,
        "enqueued": stats.enqueued,
        "processing": stats.processing,
        "succeeded": stats.succeeded,
        "failed": stats.failed,
        "deleted": stats.deleted,
    })
}
