// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! `jobsworth enqueue-demo <name>` — submit one [`crate::demo::GreeterHandler`]
//! job through the [`JobScheduler`] façade, to exercise `enqueue` end to end.

use std::sync::Arc;

use anyhow::Result;
use jobsworth_client::JobScheduler;
use jobsworth_storage::SimpleStorageProvider;

use crate::demo::greet_descriptor;

pub async fn run(name: &str) -> Result<()> {
    let scheduler = JobScheduler::new(Arc::new(SimpleStorageProvider::new()));
    let id = scheduler.enqueue(greet_descriptor(name)).await?;
    println!("enqueued job {id}");
    println!("note: this process's in-memory store exits with it — run `jobsworth serve` in the same process to see it executed, e.g. via `--seed {name}`");
    Ok(())
}
