// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! [`BackgroundJobServer`]: wires a storage provider, worker pool, and the
//! three pollers into one runnable process (§4.7).
//!
//! Every server runs its own heartbeat and `EnqueuedPoller`. Only the
//! elected master additionally runs the `ScheduledPoller`, `RecurringPoller`,
//! and `OrphanDetector` — those three would do duplicate, wasted work (or
//! worse, double-reclaim jobs) if every server ran them independently.

use std::sync::Arc;
use std::time::Duration;

use jobsworth_core::{elect_master, Clock, ServerId, ServerStatus};
use jobsworth_storage::StorageProvider;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::handler::JobHandlerRegistry;
use crate::heartbeat::{Heartbeat, OrphanDetector, DEFAULT_TIMEOUT_SECONDS};
use crate::poller::{EnqueuedPoller, RecurringPoller, ScheduledPoller};
use crate::worker_pool::WorkerPool;

pub struct BackgroundJobServer<C: Clock> {
    id: ServerId,
    name: String,
    storage: Arc<dyn StorageProvider>,
    registry: Arc<JobHandlerRegistry>,
    clock: C,
    worker_pool_size: usize,
    poll_interval: Duration,
    orphan_timeout_seconds: i64,
    heartbeat_interval: Option<Duration>,
}

impl<C: Clock> BackgroundJobServer<C> {
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn StorageProvider>,
        registry: Arc<JobHandlerRegistry>,
        clock: C,
        worker_pool_size: usize,
        poll_interval: Duration,
    ) -> Self {
        let id = ServerId::new();
        Self {
            id,
            name: name.into(),
            storage,
            registry,
            clock,
            worker_pool_size,
            poll_interval,
            orphan_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            heartbeat_interval: None,
        }
    }

    /// Override how stale a peer's heartbeat must be before its `Processing`
    /// jobs are reclaimed as orphans (§4.7, default [`DEFAULT_TIMEOUT_SECONDS`]).
    pub fn with_orphan_timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.orphan_timeout_seconds = timeout_seconds;
        self
    }

    /// Override how often a running job's `updated_at` is refreshed while a
    /// worker holds it (§4.8, default [`crate::worker_pool::DEFAULT_HEARTBEAT_INTERVAL`]).
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    fn build_worker_pool(&self) -> WorkerPool<C> {
        let pool = WorkerPool::new(self.storage.clone(), self.registry.clone(), self.clock.clone(), self.worker_pool_size, self.id);
        match self.heartbeat_interval {
            Some(interval) => pool.with_heartbeat_interval(interval),
            None => pool,
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    /// Run until `cancellation` fires. Announces this server, then drives
    /// heartbeat and polling on `poll_interval`.
    pub async fn run(&self, cancellation: CancellationToken) {
        let status = ServerStatus::new(
            self.name.clone(),
            self.worker_pool_size,
            self.poll_interval.as_secs(),
            self.clock.now_utc(),
        );
        let announced = ServerStatus { id: self.id, ..status };
        if let Err(error) = self.storage.announce_server(announced).await {
            error!(%error, "failed to announce server, running anyway");
        }

        let heartbeat = Heartbeat::new(self.storage.clone(), self.id, self.clock.clone());
        let scheduled_poller = ScheduledPoller::new(self.storage.clone(), self.clock.clone());
        let enqueued_poller = EnqueuedPoller::new(self.storage.clone(), self.id, self.clock.clone());
        let recurring_poller = RecurringPoller::new(self.storage.clone(), self.clock.clone(), self.poll_interval);
        let orphan_detector = OrphanDetector::new(self.storage.clone(), self.clock.clone())
            .with_timeout_seconds(self.orphan_timeout_seconds);
        let worker_pool = self.build_worker_pool();

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_one_pass(&heartbeat, &scheduled_poller, &enqueued_poller, &recurring_poller, &orphan_detector, &worker_pool).await;
                }
            }
        }

        // The poll loop itself stops as soon as `cancellation` fires, but
        // jobs it already handed to the pool are still running — their own
        // `run_one` tasks are what honor `cancellation`/`shutdown_grace`.
        // Wait for them here so the process doesn't exit out from under
        // them.
        worker_pool.join_idle().await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_one_pass(
        &self,
        heartbeat: &Heartbeat<C>,
        scheduled_poller: &ScheduledPoller<C>,
        enqueued_poller: &EnqueuedPoller<C>,
        recurring_poller: &RecurringPoller<C>,
        orphan_detector: &OrphanDetector<C>,
        worker_pool: &WorkerPool<C>,
    ) {
        let inflight = self.worker_pool_size.saturating_sub(worker_pool.available_permits());
        if let Err(error) = heartbeat.beat(inflight).await {
            warn!(%error, "heartbeat failed");
        }

        if self.is_master().await {
            if let Err(error) = scheduled_poller.tick().await {
                error!(%error, "scheduled poller tick failed");
            }
            if let Err(error) = recurring_poller.tick().await {
                error!(%error, "recurring poller tick failed");
            }
            if let Err(error) = orphan_detector.tick().await {
                error!(%error, "orphan detector tick failed");
            }
        }

        if let Err(error) = enqueued_poller.tick(worker_pool).await {
            error!(%error, "enqueued poller tick failed");
        }
    }

    /// Whether this server currently holds the master role (§4.7).
    pub async fn is_master(&self) -> bool {
        match self.storage.get_servers().await {
            Ok(servers) => elect_master(&servers) == Some(self.id),
            Err(error) => {
                warn!(%error, "could not read server registry for master election");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "background_job_server_tests.rs"]
mod tests;
