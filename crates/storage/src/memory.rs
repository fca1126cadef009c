// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! An in-memory [`StorageProvider`], useful for tests, demos, and the
//! single-process CLI server. `IndexMap` keeps insertion order, which gives
//! paginated queries a stable, predictable ordering without a separate sort
//! pass on every read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use jobsworth_core::{
    Job, JobId, JobState, JobStateKind, Page, PageRequest, RecurringJobDefinition, RecurringJobId,
    ServerId, ServerStatus, SortOrder,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StorageError;
use crate::provider::{JobStats, StorageProvider};

#[derive(Default)]
struct Inner {
    jobs: IndexMap<JobId, Job>,
    recurring: IndexMap<RecurringJobId, RecurringJobDefinition>,
    servers: IndexMap<ServerId, ServerStatus>,
}

/// An in-memory [`StorageProvider`] backed by a single `RwLock`. Not meant
/// to survive past one process, but gives the exact same concurrency
/// guarantees (atomic claim, optimistic-concurrency save) a real database
/// would.
#[derive(Default)]
pub struct SimpleStorageProvider {
    inner: RwLock<Inner>,
}

impl SimpleStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for SimpleStorageProvider {
    async fn save(&self, job: Job) -> Result<Job, StorageError> {
        let mut inner = self.inner.write();
        match inner.jobs.get(&job.id()) {
            None if job.version() == 1 => {}
            None => {
                return Err(StorageError::ConcurrentModification {
                    job_id: job.id(),
                    expected: job.version().saturating_sub(1),
                    actual: 0,
                });
            }
            Some(existing) if existing.version() == job.version() - 1 => {}
            Some(existing) => {
                return Err(StorageError::ConcurrentModification {
                    job_id: job.id(),
                    expected: job.version() - 1,
                    actual: existing.version(),
                });
            }
        }
        inner.jobs.insert(job.id(), job.clone());
        Ok(job)
    }

    async fn save_all(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StorageError> {
        let mut saved = Vec::with_capacity(jobs.len());
        for job in jobs {
            saved.push(self.save(job).await?);
        }
        Ok(saved)
    }

    async fn get_job_by_id(&self, id: JobId) -> Result<Job, StorageError> {
        self.inner.read().jobs.get(&id).cloned().ok_or(StorageError::JobNotFound(id))
    }

    async fn get_jobs(&self, state: JobStateKind, page: PageRequest) -> Result<Page<Job>, StorageError> {
        let inner = self.inner.read();
        let mut matching: Vec<&Job> = inner.jobs.values().filter(|j| j.state_kind() == state).collect();
        matching.sort_by_key(|j| j.updated_at());
        if page.order == SortOrder::Descending {
            matching.reverse();
        }
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();
        Ok(Page::new(items, total))
    }

    async fn count_jobs(&self, state: JobStateKind) -> Result<usize, StorageError> {
        Ok(self.inner.read().jobs.values().filter(|j| j.state_kind() == state).count())
    }

    async fn job_stats(&self) -> Result<JobStats, StorageError> {
        let inner = self.inner.read();
        let mut stats = JobStats::default();
        for job in inner.jobs.values() {
            match job.state_kind() {
                JobStateKind::Scheduled => stats.scheduled += 1,
                JobStateKind::Enqueued => stats.enqueued += 1,
                JobStateKind::Processing => stats.processing += 1,
                JobStateKind::Succeeded => stats.succeeded += 1,
                JobStateKind::Failed => stats.failed += 1,
                JobStateKind::Deleted => stats.deleted += 1,
            }
        }
        Ok(stats)
    }

    async fn delete_permanently(&self, id: JobId) -> Result<(), StorageError> {
        self.inner.write().jobs.shift_remove(&id).map(|_| ()).ok_or(StorageError::JobNotFound(id))
    }

    async fn heartbeat_job(&self, id: JobId, server_id: ServerId, now: DateTime<Utc>) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let job = inner.jobs.get_mut(&id).ok_or(StorageError::JobNotFound(id))?;
        job.touch_owned(now, server_id.as_str())?;
        Ok(())
    }

    async fn get_jobs_to_process(
        &self,
        server_id: ServerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, StorageError> {
        let mut inner = self.inner.write();
        let candidates: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|j| j.state_kind() == JobStateKind::Enqueued)
            .take(limit)
            .map(Job::id)
            .collect();

        let mut claimed = Vec::with_capacity(candidates.len());
        for id in candidates {
            let job = inner.jobs.get_mut(&id).expect("id came from the same map read above");
            job.push_state(JobState::processing(now, server_id.to_string()))?;
            debug!(job_id = %id, server_id = %server_id, "claimed job for processing");
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn get_scheduled_jobs(&self, due_before: DateTime<Utc>, limit: usize) -> Result<Vec<Job>, StorageError> {
        let inner = self.inner.read();
        let mut due: Vec<&Job> = inner
            .jobs
            .values()
            .filter(|j| j.state_kind() == JobStateKind::Scheduled && j.current_state().at() <= due_before)
            .collect();
        due.sort_by_key(|j| j.current_state().at());
        Ok(due.into_iter().take(limit).cloned().collect())
    }

    async fn save_recurring_job(&self, definition: RecurringJobDefinition) -> Result<(), StorageError> {
        self.inner.write().recurring.insert(definition.id().clone(), definition);
        Ok(())
    }

    async fn get_recurring_jobs(&self) -> Result<Vec<RecurringJobDefinition>, StorageError> {
        Ok(self.inner.read().recurring.values().cloned().collect())
    }

    async fn delete_recurring_job(&self, id: &RecurringJobId) -> Result<(), StorageError> {
        self.inner.write().recurring.shift_remove(id);
        Ok(())
    }

    async fn announce_server(&self, status: ServerStatus) -> Result<(), StorageError> {
        self.inner.write().servers.insert(status.id, status);
        Ok(())
    }

    async fn signal_server_alive(
        &self,
        id: ServerId,
        now: DateTime<Utc>,
        running_job_count: usize,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        let status = inner.servers.get_mut(&id).ok_or(StorageError::ServerNotFound(id))?;
        status.signal_alive(now, running_job_count);
        Ok(())
    }

    async fn get_servers(&self) -> Result<Vec<ServerStatus>, StorageError> {
        Ok(self.inner.read().servers.values().cloned().collect())
    }

    async fn remove_timed_out_servers(&self, now: DateTime<Utc>, timeout_seconds: i64) -> Result<Vec<ServerId>, StorageError> {
        let mut inner = self.inner.write();
        let timed_out: Vec<ServerId> = inner
            .servers
            .values()
            .filter(|s| s.is_timed_out(now, timeout_seconds))
            .map(|s| s.id)
            .collect();
        for id in &timed_out {
            inner.servers.shift_remove(id);
        }
        Ok(timed_out)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
