// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! [`JobScheduler`]: the submission façade (§4.11) — the one surface user
//! code calls to get work onto the cluster. Everything here is a thin,
//! storage-backed wrapper; none of it runs jobs or owns a worker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use jobsworth_core::{
    Job, JobDescriptor, JobId, JobState, Page, PageRequest, RecurrenceSchedule,
    RecurringJobDefinition, RecurringJobId, JobStateKind,
};
use jobsworth_storage::{JobStats, StorageProvider};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::ClientError;

/// Streamed `enqueue` calls buffer at most this many descriptors in memory
/// before flushing a batch to storage (§5 backpressure).
pub const DEFAULT_STREAM_BATCH_SIZE: usize = 2000;

/// The public entry point for submitting work: `enqueue`/`schedule`/
/// `schedule_recurringly`/`delete`, plus the read-side query helpers an
/// admin surface or CLI needs. Cheap to clone — it's just an `Arc` handle
/// over a [`StorageProvider`].
#[derive(Clone)]
pub struct JobScheduler {
    storage: Arc<dyn StorageProvider>,
}

impl JobScheduler {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    /// Enqueue one job to run as soon as a worker is free.
    pub async fn enqueue(&self, descriptor: JobDescriptor) -> Result<JobId, ClientError> {
        let job = Job::new(descriptor, JobState::enqueued(Utc::now()))?;
        let id = job.id();
        self.storage.save(job).await?;
        Ok(id)
    }

    /// Enqueue every descriptor produced by `descriptors`, without ever
    /// materializing the whole stream in memory — it is chunked into
    /// batches of at most `batch_size` before each flush to storage (§5).
    pub async fn enqueue_stream<S>(
        &self,
        descriptors: S,
        batch_size: usize,
    ) -> Result<Vec<JobId>, ClientError>
    where
        S: Stream<Item = JobDescriptor> + Unpin,
    {
        let batch_size = batch_size.max(1);
        let mut ids = Vec::new();
        let mut chunks = descriptors.chunks(batch_size);
        while let Some(chunk) = chunks.next().await {
            let now = Utc::now();
            let mut jobs = Vec::with_capacity(chunk.len());
            for descriptor in chunk {
                jobs.push(Job::new(descriptor, JobState::enqueued(now))?);
            }
            ids.extend(jobs.iter().map(Job::id));
            self.storage.save_all(jobs).await?;
        }
        Ok(ids)
    }

    /// Schedule a job to become `Enqueued` at `when` (normalized to UTC by
    /// the caller's `DateTime<Utc>` — zoned/offset timestamps are converted
    /// before reaching this call).
    pub async fn schedule(&self, descriptor: JobDescriptor, when: DateTime<Utc>) -> Result<JobId, ClientError> {
        let job = Job::new(descriptor, JobState::scheduled(when, None))?;
        let id = job.id();
        self.storage.save(job).await?;
        Ok(id)
    }

    /// Upsert a recurring job definition. `id` defaults to a stable hash of
    /// `descriptor` + `cron_expression` + `timezone` when omitted, so
    /// re-registering the same call under the same schedule at startup
    /// replaces the prior definition instead of creating a duplicate.
    pub async fn schedule_recurringly(
        &self,
        id: Option<RecurringJobId>,
        descriptor: JobDescriptor,
        cron_expression: &str,
        timezone: &str,
    ) -> Result<RecurringJobId, ClientError> {
        let schedule = RecurrenceSchedule::parse(cron_expression, timezone)?;
        let id = id.unwrap_or_else(|| default_recurring_id(&descriptor, cron_expression, timezone));
        let definition = RecurringJobDefinition::new(id.clone(), descriptor, schedule, Utc::now());
        self.storage.save_recurring_job(definition).await?;
        info!(id = %id, cron = %cron_expression, %timezone, "registered recurring job");
        Ok(id)
    }

    /// Remove a recurring definition. Jobs it already materialized are left
    /// to run or be deleted independently (§4.6).
    pub async fn delete_recurringly(&self, id: &RecurringJobId) -> Result<(), ClientError> {
        self.storage.delete_recurring_job(id).await?;
        Ok(())
    }

    /// Mark a job `Deleted`. A job already `Processing` is left to finish —
    /// the worker pool's cooperative-cancellation path is what stops it
    /// early, not this call.
    pub async fn delete(&self, job_id: JobId) -> Result<(), ClientError> {
        let mut job = self.storage.get_job_by_id(job_id).await?;
        job.push_state(JobState::deleted(Utc::now(), Some("deleted by caller".into())))?;
        self.storage.save(job).await?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Job, ClientError> {
        Ok(self.storage.get_job_by_id(job_id).await?)
    }

    pub async fn get_jobs(&self, state: JobStateKind, page: PageRequest) -> Result<Page<Job>, ClientError> {
        Ok(self.storage.get_jobs(state, page).await?)
    }

    pub async fn count_jobs(&self, state: JobStateKind) -> Result<usize, ClientError> {
        Ok(self.storage.count_jobs(state).await?)
    }

    pub async fn job_stats(&self) -> Result<JobStats, ClientError> {
        Ok(self.storage.job_stats().await?)
    }
}

/// A stable id for a recurring definition derived from what it runs and
/// when, so re-registering the identical call + schedule at process
/// startup is a no-op rather than a fresh definition each time.
fn default_recurring_id(descriptor: &JobDescriptor, cron_expression: &str, timezone: &str) -> RecurringJobId {
    let mut hasher = Sha256::new();
    hasher.update(descriptor.job_type.as_bytes());
    hasher.update(b"\0");
    hasher.update(descriptor.method.as_bytes());
    hasher.update(b"\0");
    hasher.update(cron_expression.as_bytes());
    hasher.update(b"\0");
    hasher.update(timezone.as_bytes());
    let digest = hasher.finalize();
    RecurringJobId::new(format!("auto-{:x}", digest).chars().take(5 + 16).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsworth_storage::SimpleStorageProvider;

    fn descriptor() -> JobDescriptor {
        JobDescriptor::new("demo.Greeter", "greet").build()
    }

    fn scheduler() -> JobScheduler {
        JobScheduler::new(Arc::new(SimpleStorageProvider::new()))
    }

    #[tokio::test]
    async fn enqueue_creates_a_job_in_enqueued_state() {
        let client = scheduler();
        let id = client.enqueue(descriptor()).await.unwrap();
        let job = client.get_job(id).await.unwrap();
        assert_eq!(job.state_kind(), JobStateKind::Enqueued);
    }

    #[tokio::test]
    async fn schedule_creates_a_job_in_scheduled_state() {
        let client = scheduler();
        let when = Utc::now() + chrono::Duration::seconds(7);
        let id = client.schedule(descriptor(), when).await.unwrap();
        let job = client.get_job(id).await.unwrap();
        assert_eq!(job.state_kind(), JobStateKind::Scheduled);
    }

    #[tokio::test]
    async fn enqueue_stream_batches_without_exceeding_batch_size_calls() {
        let client = scheduler();
        let descriptors: Vec<_> = (0..5).map(|_| descriptor()).collect();
        let stream = futures_util::stream::iter(descriptors);
        let ids = client.enqueue_stream(stream, 2).await.unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(client.count_jobs(JobStateKind::Enqueued).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn schedule_recurringly_without_id_is_stable_across_calls() {
        let client = scheduler();
        let first = client
            .schedule_recurringly(None, descriptor(), "* * * * *", "UTC")
            .await
            .unwrap();
        let second = client
            .schedule_recurringly(None, descriptor(), "* * * * *", "UTC")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(client.storage.get_recurring_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_recurringly_removes_the_definition() {
        let client = scheduler();
        let id = client
            .schedule_recurringly(Some("nightly".into()), descriptor(), "0 0 * * *", "UTC")
            .await
            .unwrap();
        client.delete_recurringly(&id).await.unwrap();
        assert!(client.storage.get_recurring_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_marks_job_deleted() {
        let client = scheduler();
        let id = client.enqueue(descriptor()).await.unwrap();
        client.delete(id).await.unwrap();
        let job = client.get_job(id).await.unwrap();
        assert_eq!(job.state_kind(), JobStateKind::Deleted);
    }
}
