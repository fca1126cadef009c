// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! `jobsworth serve` — run a single [`BackgroundJobServer`] in the
//! foreground, with the bundled [`crate::demo::GreeterHandler`] registered
//! so the process has something to execute out of the box.

use std::sync::Arc;

use anyhow::Result;
use jobsworth_client::JobScheduler;
use jobsworth_core::SystemClock;
use jobsworth_server::{BackgroundJobServer, JobHandlerRegistry};
use jobsworth_storage::SimpleStorageProvider;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::demo::{greet_descriptor, GreeterHandler};

pub async fn run(config: ServerConfig, seed: Option<String>) -> Result<()> {
    let storage = Arc::new(SimpleStorageProvider::new());
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(GreeterHandler));

    if let Some(name) = seed {
        let scheduler = JobScheduler::new(storage.clone());
        let id = scheduler.enqueue(greet_descriptor(&name)).await?;
        info!(job_id = %id, %name, "seeded demo job");
    }

    let server = BackgroundJobServer::new(
        config.server_name.clone(),
        storage,
        Arc::new(registry),
        SystemClock,
        config.resolved_worker_pool_size(),
        std::time::Duration::from_secs(config.resolved_poll_interval_seconds()),
    )
    .with_orphan_timeout_seconds(config.server_timeout_seconds())
    .with_heartbeat_interval(std::time::Duration::from_secs(
        (config.server_timeout_seconds() / 2).max(1) as u64,
    ));

    info!(
        server_id = %server.id(),
        worker_pool_size = config.resolved_worker_pool_size(),
        poll_interval_seconds = config.resolved_poll_interval_seconds(),
        "starting jobsworth server"
    );

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown.cancel();
    });

    server.run(cancellation).await;
    info!("server stopped");
    Ok(())
}
