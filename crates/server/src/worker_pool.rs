// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! The worker pool: runs claimed jobs concurrently up to a fixed
//! concurrency limit, with cooperative cancellation on shutdown (§4.4).

use std::sync::Arc;
use std::time::Duration;

use jobsworth_core::{Clock, Job, JobContext, JobDescriptor, JobState, ServerId};
use jobsworth_storage::StorageProvider;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::handler::{HandlerError, JobHandlerRegistry};
use crate::retry::{apply_filters, FilterChain, RetryFilter};

/// How long a cancelled job body is given to notice and return before it is
/// abandoned to orphan recovery (§5 "grace timeout").
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How often a running job's `updated_at` is refreshed in storage while its
/// handler is still executing (§4.8). Half the orphan timeout, so a job
/// survives missing one heartbeat without being mistaken for orphaned.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration =
    Duration::from_secs(crate::heartbeat::DEFAULT_TIMEOUT_SECONDS as u64 / 2);

/// Runs claimed jobs against their registered [`crate::handler::JobHandler`],
/// bounded to `pool_size` concurrent job bodies via a [`Semaphore`].
pub struct WorkerPool<C: Clock> {
    storage: Arc<dyn StorageProvider>,
    registry: Arc<JobHandlerRegistry>,
    retry: Arc<RetryFilter>,
    filters: Arc<FilterChain>,
    semaphore: Arc<Semaphore>,
    clock: C,
    shutdown_grace: Duration,
    heartbeat_interval: Duration,
    server_id: ServerId,
    inflight: Mutex<JoinSet<()>>,
}

impl<C: Clock> WorkerPool<C> {
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        registry: Arc<JobHandlerRegistry>,
        clock: C,
        pool_size: usize,
        server_id: ServerId,
    ) -> Self {
        Self {
            storage,
            registry,
            retry: Arc::new(RetryFilter::default()),
            filters: Arc::new(FilterChain::new()),
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
            clock,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            server_id,
            inflight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryFilter) -> Self {
        self.retry = Arc::new(retry);
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = Arc::new(filters);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Override how often a running job's `updated_at` is refreshed in
    /// storage (§4.8, default [`DEFAULT_HEARTBEAT_INTERVAL`]).
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Free worker slots right now, i.e. `pool_size - inflight`. The
    /// enqueued-poller uses this to cap how many jobs it claims per tick
    /// (§4.5, §5 backpressure) so claimed-but-unstarted jobs never pile up
    /// waiting on the semaphore.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Spawn every job in `jobs` onto its own task and return as soon as
    /// they're all launched — this never waits for a job body to finish.
    /// Pollers themselves must never block on a job body (§5): concurrency
    /// stays bounded by the pool's `Semaphore` (acquiring a permit here can
    /// make this call wait briefly if the caller claimed more jobs than it
    /// had free slots for, but it never waits for one to *complete*), and
    /// each task persists its own outcome when it finishes.
    pub async fn run_claimed(&self, jobs: Vec<Job>, cancellation: CancellationToken) {
        let mut inflight = self.inflight.lock().await;
        reap_finished(&mut inflight);
        for job in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("worker pool semaphore is never closed while the pool is alive");
            let storage = self.storage.clone();
            let registry = self.registry.clone();
            let retry = self.retry.clone();
            let filters = self.filters.clone();
            let clock = self.clock.clone();
            let cancellation = cancellation.clone();
            let shutdown_grace = self.shutdown_grace;
            let heartbeat_interval = self.heartbeat_interval;
            let server_id = self.server_id;
            inflight.spawn(async move {
                let _permit = permit;
                run_one(
                    job,
                    storage,
                    registry,
                    retry,
                    filters,
                    clock,
                    cancellation,
                    shutdown_grace,
                    heartbeat_interval,
                    server_id,
                )
                .await;
            });
        }
    }

    /// Wait for every job spawned by [`Self::run_claimed`] so far to finish.
    /// Used on shutdown, after the poll loop itself has stopped, and by
    /// tests that need to observe a job's outcome deterministically.
    pub async fn join_idle(&self) {
        let mut inflight = self.inflight.lock().await;
        while inflight.join_next().await.is_some() {}
    }
}

/// Non-blocking cleanup of tasks that already finished, so a long-lived pool
/// doesn't accumulate one dead `JoinHandle` per job it ever ran.
fn reap_finished(set: &mut JoinSet<()>) {
    while set.try_join_next().is_some() {}
}

async fn dispatch(
    registry: &JobHandlerRegistry,
    descriptor: &JobDescriptor,
    ctx: JobContext,
) -> Result<(), HandlerError> {
    match registry.get(&descriptor.job_type) {
        Some(handler) => handler.handle(descriptor, ctx).await,
        None => Err(HandlerError::permanent(format!(
            "no handler registered for {}",
            descriptor.display_name()
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one<C: Clock>(
    mut job: Job,
    storage: Arc<dyn StorageProvider>,
    registry: Arc<JobHandlerRegistry>,
    retry: Arc<RetryFilter>,
    filters: Arc<FilterChain>,
    clock: C,
    cancellation: CancellationToken,
    shutdown_grace: Duration,
    heartbeat_interval: Duration,
    server_id: ServerId,
) {
    let descriptor = job.descriptor().clone();
    let previous = job.current_state().clone();
    let ctx = JobContext::new(job.id());
    let cancel_handle = ctx.clone();
    let job_id = job.id();

    let dispatch_fut = dispatch(&registry, &descriptor, ctx);
    tokio::pin!(dispatch_fut);

    let mut heartbeat_ticker = tokio::time::interval(heartbeat_interval);
    heartbeat_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat_ticker.tick().await; // first tick fires immediately; skip it

    // The body runs to completion on the happy path. Two things can
    // interleave with it: a periodic heartbeat (never touches `history`,
    // just tells the orphan detector this job is still alive) and a
    // shutdown request, which flips the body's cancellation flag and keeps
    // polling the *same* future (never drop-and-restart it) for up to
    // `shutdown_grace`, so a body that checks `JobContext::is_cancelled`
    // gets a real chance to wind down and return before we give up on it.
    let mut shutdown_requested = false;
    let outcome = loop {
        tokio::select! {
            result = &mut dispatch_fut => break Some(result),
            _ = heartbeat_ticker.tick() => {
                let now = clock.now_utc();
                if let Err(error) = storage.heartbeat_job(job_id, server_id, now).await {
                    error!(job_id = %job_id, %error, "failed to heartbeat running job");
                }
            }
            _ = cancellation.cancelled() => {
                shutdown_requested = true;
                cancel_handle.cancel();
                break tokio::time::timeout(shutdown_grace, &mut dispatch_fut).await.ok();
            }
        }
    };

    // Exceeded the grace period without honoring cancellation: leave the
    // job `Processing` for another server's orphan detector to reclaim
    // (§5). Persisting a state here would race whatever the body is still
    // doing to its own resources.
    let Some(result) = outcome else { return };

    job.merge_metadata(cancel_handle.metadata_snapshot());

    let now = clock.now_utc();
    let raw_next_state = match result {
        // Finished only because shutdown asked it to — not a trustworthy
        // success, so it is retried rather than recorded `Succeeded` (§4.4).
        Ok(()) if shutdown_requested => {
            retry.on_failure(&job, now, &HandlerError::new("server shutting down"))
        }
        Ok(()) => {
            let latency_ms = (now - previous.at()).num_milliseconds().max(0);
            JobState::succeeded(now, latency_ms)
        }
        Err(error) => retry.on_failure(&job, now, &error),
    };

    // §4.10: every state is offered to the filter pipeline before it is
    // persisted. `retry` runs first since it's the one built-in filter
    // (§4.5); any server-supplied filters get the final say and may cancel
    // (return `None`, leaving the candidate as-is) or replace it outright.
    let next_state = apply_filters(&retry, &filters, &job, Some(&previous), &raw_next_state)
        .unwrap_or(raw_next_state);

    if let Err(error) = job.push_state_owned(next_state, server_id.as_str()) {
        error!(job_id = %job.id(), %error, "failed to apply post-run state transition");
        return;
    }
    filters.notify(&job, Some(&previous));

    // A `Failed` landing that isn't terminal gets one more trip through the
    // filter pipeline, proposing "stay put" as the default: this is where
    // `RetryFilter` rewrites the transition onward to `Scheduled(retry_at)`
    // (§4.10), same mechanism a user's own filter would use to do the same.
    let committed = job.current_state().clone();
    if let Some(continuation) = apply_filters(&retry, &filters, &job, Some(&committed), &committed) {
        if let Err(error) = job.push_state(continuation) {
            error!(job_id = %job.id(), %error, "failed to schedule retry");
            return;
        }
        filters.notify(&job, Some(&committed));
    }

    if let Err(error) = storage.save(job).await {
        error!(%error, "failed to persist job after run");
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
