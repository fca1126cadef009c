// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use super::*;
use crate::handler::JobHandler;
use async_trait::async_trait;
use jobsworth_core::{FakeClock, JobDescriptor, JobState, JobStateKind, ServerId};
use jobsworth_storage::SimpleStorageProvider;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

fn descriptor(name: &str) -> JobDescriptor {
    JobDescriptor::new("demo.Greeter", name).build()
}

struct AlwaysSucceeds(Arc<AtomicUsize>);

#[async_trait]
impl JobHandler for AlwaysSucceeds {
    fn job_type(&self) -> &str {
        "demo.Greeter"
    }

    async fn handle(&self, _descriptor: &JobDescriptor, _ctx: JobContext) -> Result<(), HandlerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait]
impl JobHandler for AlwaysFails {
    fn job_type(&self) -> &str {
        "demo.Greeter"
    }

    async fn handle(&self, _descriptor: &JobDescriptor, _ctx: JobContext) -> Result<(), HandlerError> {
        Err(HandlerError::new("boom"))
    }
}

async fn enqueue_and_claim(
    storage: &dyn StorageProvider,
    clock: &FakeClock,
    n: usize,
    server_id: ServerId,
) -> Vec<Job> {
    for _ in 0..n {
        let job = Job::new(descriptor("greet"), JobState::enqueued(clock.now_utc())).unwrap();
        storage.save(job).await.unwrap();
    }
    storage.get_jobs_to_process(server_id, clock.now_utc(), n).await.unwrap()
}

#[tokio::test]
async fn successful_job_ends_up_succeeded() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(AlwaysSucceeds(calls.clone())));

    let server_id = ServerId::new();
    let jobs = enqueue_and_claim(storage.as_ref(), &clock, 1, server_id).await;
    let job_id = jobs[0].id();

    let pool = WorkerPool::new(storage.clone(), Arc::new(registry), clock, 4, server_id);
    pool.run_claimed(jobs, CancellationToken::new()).await;
    pool.join_idle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let saved = storage.get_job_by_id(job_id).await.unwrap();
    assert_eq!(saved.state_kind(), JobStateKind::Succeeded);
}

#[tokio::test]
async fn failing_job_is_rescheduled_for_retry() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(AlwaysFails));

    let server_id = ServerId::new();
    let jobs = enqueue_and_claim(storage.as_ref(), &clock, 1, server_id).await;
    let job_id = jobs[0].id();

    let pool = WorkerPool::new(storage.clone(), Arc::new(registry), clock, 4, server_id).with_retry(RetryFilter::new(5));
    pool.run_claimed(jobs, CancellationToken::new()).await;
    pool.join_idle().await;

    let saved = storage.get_job_by_id(job_id).await.unwrap();
    assert_eq!(saved.state_kind(), JobStateKind::Scheduled);
    let kinds: Vec<_> = saved.history().iter().map(JobState::kind).collect();
    assert!(kinds.contains(&JobStateKind::Failed));
}

#[tokio::test]
async fn jobs_run_concurrently_up_to_the_pool_limit() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(AlwaysSucceeds(calls.clone())));

    let server_id = ServerId::new();
    let jobs = enqueue_and_claim(storage.as_ref(), &clock, 6, server_id).await;

    let pool = WorkerPool::new(storage.clone(), Arc::new(registry), clock, 2, server_id);
    pool.run_claimed(jobs, CancellationToken::new()).await;
    pool.join_idle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(storage.count_jobs(JobStateKind::Succeeded).await.unwrap(), 6);
}

struct ChecksCancellation;

#[async_trait]
impl JobHandler for ChecksCancellation {
    fn job_type(&self) -> &str {
        "demo.Greeter"
    }

    async fn handle(&self, _descriptor: &JobDescriptor, ctx: JobContext) -> Result<(), HandlerError> {
        for _ in 0..50 {
            if ctx.is_cancelled() {
                return Ok(());
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        Ok(())
    }
}

#[tokio::test]
async fn cooperative_body_sees_cancellation_and_is_retried_not_succeeded() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(ChecksCancellation));

    let server_id = ServerId::new();
    let jobs = enqueue_and_claim(storage.as_ref(), &clock, 1, server_id).await;
    let job_id = jobs[0].id();

    let pool = WorkerPool::new(storage.clone(), Arc::new(registry), clock, 4, server_id)
        .with_shutdown_grace(StdDuration::from_millis(500));
    let cancellation = CancellationToken::new();
    pool.run_claimed(jobs, cancellation.clone()).await;
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    cancellation.cancel();
    pool.join_idle().await;

    let saved = storage.get_job_by_id(job_id).await.unwrap();
    // The body noticed cancellation and returned `Ok`, but a shutdown-forced
    // completion is never recorded as a trustworthy `Succeeded` (§4.4).
    assert_eq!(saved.state_kind(), JobStateKind::Scheduled);
    let kinds: Vec<_> = saved.history().iter().map(JobState::kind).collect();
    assert!(kinds.contains(&JobStateKind::Failed));
}

struct NeverNoticesCancellation;

#[async_trait]
impl JobHandler for NeverNoticesCancellation {
    fn job_type(&self) -> &str {
        "demo.Greeter"
    }

    async fn handle(&self, _descriptor: &JobDescriptor, _ctx: JobContext) -> Result<(), HandlerError> {
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn body_that_ignores_cancellation_is_abandoned_after_grace_period() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let mut registry = JobHandlerRegistry::new();
    registry.register(Arc::new(NeverNoticesCancellation));

    let server_id = ServerId::new();
    let jobs = enqueue_and_claim(storage.as_ref(), &clock, 1, server_id).await;
    let job_id = jobs[0].id();

    let pool = WorkerPool::new(storage.clone(), Arc::new(registry), clock, 4, server_id)
        .with_shutdown_grace(StdDuration::from_millis(100));
    let cancellation = CancellationToken::new();
    cancellation.cancel();
    pool.run_claimed(jobs, cancellation).await;
    pool.join_idle().await;

    let saved = storage.get_job_by_id(job_id).await.unwrap();
    assert_eq!(saved.state_kind(), JobStateKind::Processing);
}
