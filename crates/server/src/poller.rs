// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Pollers (§4.6): the three independent loops that move jobs through the
//! `Scheduled -> Enqueued -> Processing` pipeline and expand recurring
//! definitions into concrete jobs.

use std::sync::Arc;

use jobsworth_core::{Clock, Job, JobState, ServerId};
use jobsworth_storage::StorageProvider;
use tracing::{info, warn};

use crate::worker_pool::WorkerPool;

/// Default batch size for a single poll pass, mirroring the common
/// default of twenty for this kind of job-processor poller.
pub const DEFAULT_POLL_BATCH_SIZE: usize = 20;

/// Moves due `Scheduled` jobs into `Enqueued`.
pub struct ScheduledPoller<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    clock: C,
    batch_size: usize,
}

impl<C: Clock> ScheduledPoller<C> {
    pub fn new(storage: Arc<dyn StorageProvider>, clock: C) -> Self {
        Self { storage, clock, batch_size: DEFAULT_POLL_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// One poll pass: enqueue every `Scheduled` job due by now. Returns how
    /// many jobs were moved.
    pub async fn tick(&self) -> Result<usize, jobsworth_storage::StorageError> {
        let now = self.clock.now_utc();
        let due = self.storage.get_scheduled_jobs(now, self.batch_size).await?;
        let moved = due.len();
        for mut job in due {
            job.push_state(JobState::enqueued(now))?;
            self.storage.save(job).await?;
        }
        if moved > 0 {
            info!(moved, "enqueued due scheduled jobs");
        }
        Ok(moved)
    }
}

/// Claims `Enqueued` jobs for this server and hands them to the worker pool.
pub struct EnqueuedPoller<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    server_id: ServerId,
    clock: C,
    batch_size: usize,
}

impl<C: Clock> EnqueuedPoller<C> {
    pub fn new(storage: Arc<dyn StorageProvider>, server_id: ServerId, clock: C) -> Self {
        Self { storage, server_id, clock, batch_size: DEFAULT_POLL_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Claim up to `min(batch_size, W - inflight)` enqueued jobs and hand
    /// them to `worker_pool`, so a tick never claims more work than the pool
    /// has free slots for (§4.5, §5 backpressure). `WorkerPool::run_claimed`
    /// spawns each job onto its own task and returns immediately, so this
    /// tick — and the poll loop driving it — never blocks on a job body
    /// (§5). Returns how many jobs were claimed.
    pub async fn tick(&self, worker_pool: &WorkerPool<C>) -> Result<usize, jobsworth_storage::StorageError> {
        let now = self.clock.now_utc();
        let limit = self.batch_size.min(worker_pool.available_permits());
        if limit == 0 {
            return Ok(0);
        }
        let claimed = self.storage.get_jobs_to_process(self.server_id, now, limit).await?;
        let count = claimed.len();
        if count > 0 {
            info!(count, server_id = %self.server_id, "claimed enqueued jobs");
            worker_pool.run_claimed(claimed, tokio_util::sync::CancellationToken::new()).await;
        }
        Ok(count)
    }
}

/// Materializes the single next fire of every registered recurring job
/// definition into a concrete `Job` — `Scheduled` if it's still ahead of
/// now, `Enqueued` directly if it's already due (§4.6).
pub struct RecurringPoller<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    clock: C,
    lookahead: chrono::Duration,
}

impl<C: Clock> RecurringPoller<C> {
    /// `poll_interval` is the cadence this poller is driven at; a next fire
    /// more than twice that away is left for a later tick to pick up, so the
    /// watermark never races ahead of polling (§4.6).
    pub fn new(storage: Arc<dyn StorageProvider>, clock: C, poll_interval: std::time::Duration) -> Self {
        let lookahead =
            chrono::Duration::from_std(poll_interval * 2).unwrap_or_else(|_| chrono::Duration::seconds(0));
        Self { storage, clock, lookahead }
    }

    /// One poll pass over every recurring job definition. Definitions whose
    /// schedule failed to rehydrate (e.g. an unknown timezone that was
    /// valid when first registered) are skipped and logged, not fatal.
    pub async fn tick(&self) -> Result<usize, jobsworth_storage::StorageError> {
        let now = self.clock.now_utc();
        let definitions = self.storage.get_recurring_jobs().await?;
        let mut created = 0;
        for mut definition in definitions {
            if definition.schedule().is_none() {
                warn!(id = %definition.id(), "recurring job has no rehydrated schedule, skipping");
                continue;
            }
            let Some((fire_at, due_now)) = definition.next_fire_to_materialize(now, self.lookahead) else {
                continue;
            };
            let state = if due_now { JobState::enqueued(fire_at) } else { JobState::scheduled(fire_at, None) };
            let job = Job::new(definition.descriptor().clone(), state)?;
            self.storage.save(job).await?;
            created += 1;
            self.storage.save_recurring_job(definition).await?;
        }
        if created > 0 {
            info!(created, "created jobs from recurring definitions");
        }
        Ok(created)
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
