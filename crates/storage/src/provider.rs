// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! The storage contract (§4.1): every place the rest of `jobsworth` touches
//! persistence goes through this trait, so a provider can be swapped for a
//! real database without the server or client crates changing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsworth_core::{Job, JobId, JobStateKind, Page, PageRequest, RecurringJobDefinition, RecurringJobId, ServerId, ServerStatus};

use crate::error::StorageError;

/// A stats snapshot exposed for operators and the client's query helpers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub scheduled: usize,
    pub enqueued: usize,
    pub processing: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub deleted: usize,
}

/// The full storage contract a background job system runs against.
///
/// Implementations must provide atomic, exactly-once semantics for
/// `save`/`save_all` (optimistic concurrency keyed on [`Job::version`]) and
/// `get_jobs_to_process` (no two servers may claim the same job), since
/// those two operations are what keeps the job state machine consistent
/// across a cluster of `BackgroundJobServer`s.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Persist a job's full current state. Succeeds only if no other writer
    /// has saved a newer version since `job` was loaded — see the
    /// module-level optimistic-concurrency note in [`jobsworth_core::job`].
    async fn save(&self, job: Job) -> Result<Job, StorageError>;

    /// Persist many jobs as a batch. Each entry is checked independently;
    /// a conflict on one job does not roll back the others.
    async fn save_all(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StorageError>;

    async fn get_job_by_id(&self, id: JobId) -> Result<Job, StorageError>;

    async fn get_jobs(&self, state: JobStateKind, page: PageRequest) -> Result<Page<Job>, StorageError>;

    async fn count_jobs(&self, state: JobStateKind) -> Result<usize, StorageError>;

    async fn job_stats(&self) -> Result<JobStats, StorageError>;

    /// Remove a job from storage entirely, regardless of its current state.
    async fn delete_permanently(&self, id: JobId) -> Result<(), StorageError>;

    /// Refresh a `Processing` job's `updated_at` without touching its state
    /// history (§4.8). Called on `heartbeatInterval` by the worker holding
    /// the job, so the orphan detector can tell a long-running job apart
    /// from one whose owner vanished mid-run.
    async fn heartbeat_job(&self, id: JobId, server_id: ServerId, now: DateTime<Utc>) -> Result<(), StorageError>;

    /// Atomically claim up to `limit` `Enqueued` jobs for `server_id`,
    /// transitioning each to `Processing` as part of the same operation so
    /// no other server can claim them too. Returns the claimed jobs in the
    /// order they should be handed to the worker pool.
    async fn get_jobs_to_process(
        &self,
        server_id: ServerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, StorageError>;

    /// `Scheduled` jobs whose `scheduled_at` is at or before `due_before`,
    /// used by the scheduled-job poller to move jobs into `Enqueued` (§4.6).
    async fn get_scheduled_jobs(&self, due_before: DateTime<Utc>, limit: usize) -> Result<Vec<Job>, StorageError>;

    /// Create or replace a recurring job definition under its id.
    async fn save_recurring_job(&self, definition: RecurringJobDefinition) -> Result<(), StorageError>;

    async fn get_recurring_jobs(&self) -> Result<Vec<RecurringJobDefinition>, StorageError>;

    /// Idempotent: deleting an id that was never registered is not an error.
    async fn delete_recurring_job(&self, id: &RecurringJobId) -> Result<(), StorageError>;

    /// Register (or re-register, on restart) a server.
    async fn announce_server(&self, status: ServerStatus) -> Result<(), StorageError>;

    async fn signal_server_alive(
        &self,
        id: ServerId,
        now: DateTime<Utc>,
        running_job_count: usize,
    ) -> Result<(), StorageError>;

    async fn get_servers(&self) -> Result<Vec<ServerStatus>, StorageError>;

    /// Remove every server whose heartbeat is older than `timeout_seconds`
    /// and report which ones were removed, so the caller can run orphan
    /// detection against their formerly-owned jobs (§4.7).
    async fn remove_timed_out_servers(&self, now: DateTime<Utc>, timeout_seconds: i64) -> Result<Vec<ServerId>, StorageError>;
}
