// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Heartbeat and orphan detection (§4.7): a server renews its own
//! `last_heartbeat` on an interval, and periodically sweeps for servers
//! that stopped renewing theirs — reclaiming whatever jobs they left
//! `Processing`.

use std::collections::HashSet;
use std::sync::Arc;

use jobsworth_core::{Clock, JobState, JobStateKind, PageRequest, ServerId, ServerStatus};
use jobsworth_storage::{StorageError, StorageProvider};
use tracing::{info, warn};

use crate::handler::HandlerError;
use crate::retry::{apply_filters, FilterChain, RetryFilter};

/// Default heartbeat timeout: a server is considered dead once its
/// heartbeat is more than 30 seconds stale.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 30;

/// Renews a single server's heartbeat record.
pub struct Heartbeat<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    server_id: ServerId,
    clock: C,
}

impl<C: Clock> Heartbeat<C> {
    pub fn new(storage: Arc<dyn StorageProvider>, server_id: ServerId, clock: C) -> Self {
        Self { storage, server_id, clock }
    }

    /// Announce this server's existence for the first time.
    pub async fn announce(&self, status: ServerStatus) -> Result<(), StorageError> {
        self.storage.announce_server(status).await
    }

    /// Refresh `last_heartbeat`. Called on a fixed interval; missing two or
    /// three of these in a row is what eventually marks the server timed out.
    pub async fn beat(&self, running_job_count: usize) -> Result<(), StorageError> {
        let now = self.clock.now_utc();
        self.storage.signal_server_alive(self.server_id, now, running_job_count).await
    }
}

/// Sweeps for `Processing` jobs that no live server is actually still
/// running and reclaims them: each is pushed through
/// `Failed("server timed out")` and then the retry filter, same as any
/// other handler failure (§4.8), so it re-emerges as `Scheduled` with
/// normal backoff rather than skipping the failure record entirely.
///
/// A job is orphaned by either of two independent criteria (invariant 5):
/// its `server_id` no longer appears in the live-server set, or its
/// `updated_at` has gone stale even though the server is still announced
/// (a server that stopped heartbeating a specific job without dying
/// outright). Neither criterion depends on a server having been removed
/// in this same tick.
pub struct OrphanDetector<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    clock: C,
    timeout_seconds: i64,
    retry: Arc<RetryFilter>,
    filters: Arc<FilterChain>,
}

impl<C: Clock> OrphanDetector<C> {
    pub fn new(storage: Arc<dyn StorageProvider>, clock: C) -> Self {
        Self {
            storage,
            clock,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry: Arc::new(RetryFilter::default()),
            filters: Arc::new(FilterChain::new()),
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retry(mut self, retry: RetryFilter) -> Self {
        self.retry = Arc::new(retry);
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = Arc::new(filters);
        self
    }

    /// One sweep: remove timed-out servers from the registry, then scan
    /// every `Processing` job and reclaim any whose `server_id` is not in
    /// the live-server set or whose `updated_at` is older than
    /// `timeout_seconds`, independent of which servers were just removed
    /// above. Returns the number of jobs reclaimed.
    pub async fn tick(&self) -> Result<usize, StorageError> {
        let now = self.clock.now_utc();
        let removed = self.storage.remove_timed_out_servers(now, self.timeout_seconds).await?;
        if !removed.is_empty() {
            warn!(count = removed.len(), "removed timed-out servers");
        }

        let live_servers: HashSet<String> =
            self.storage.get_servers().await?.into_iter().map(|s| s.id.to_string()).collect();

        let processing = self
            .storage
            .get_jobs(JobStateKind::Processing, PageRequest::first(usize::MAX))
            .await?;

        let mut reclaimed = 0;
        for mut job in processing.items {
            let JobState::Processing { server_id, .. } = job.current_state() else { continue };
            let stale = now.signed_duration_since(job.updated_at()).num_seconds() > self.timeout_seconds;
            if live_servers.contains(server_id) && !stale {
                continue;
            }

            let previous = job.current_state().clone();
            let failure = HandlerError::new("server timed out");
            let raw_next_state = self.retry.on_failure(&job, now, &failure);

            // Same filter pipeline a handler failure goes through
            // (`worker_pool::run_one`) — an orphan reclaim is just another
            // kind of failure, not a special case (§4.10).
            let next_state = apply_filters(&self.retry, &self.filters, &job, Some(&previous), &raw_next_state)
                .unwrap_or(raw_next_state);
            job.push_state(next_state)?;
            self.filters.notify(&job, Some(&previous));

            let committed = job.current_state().clone();
            if let Some(continuation) =
                apply_filters(&self.retry, &self.filters, &job, Some(&committed), &committed)
            {
                job.push_state(continuation)?;
                self.filters.notify(&job, Some(&committed));
            }

            self.storage.save(job).await?;
            reclaimed += 1;
        }
        if reclaimed > 0 {
            info!(reclaimed, "reclaimed orphaned jobs from timed-out servers");
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
