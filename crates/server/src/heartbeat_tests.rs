// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use super::*;
use crate::retry::StateFilter;
use chrono::{DateTime, Utc};
use jobsworth_core::{FakeClock, Job, JobDescriptor};
use jobsworth_storage::SimpleStorageProvider;

fn descriptor() -> JobDescriptor {
    JobDescriptor::new("demo.Greeter", "greet").build()
}

struct DeadLetterFilter(DateTime<Utc>);

impl StateFilter for DeadLetterFilter {
    fn apply_state(&self, _job: &Job, previous: Option<&JobState>, next: &JobState) -> Option<JobState> {
        let previous_is_processing = matches!(previous, Some(JobState::Processing { .. }));
        match next {
            JobState::Failed { .. } if previous_is_processing => {
                Some(JobState::scheduled(self.0, Some("dead-lettered".to_string())))
            }
            _ => None,
        }
    }

    fn on_state_applied(&self, _job: &Job, _previous: Option<&JobState>) {}
}

#[tokio::test]
async fn heartbeat_announces_and_renews() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();
    let server_id = ServerId::new();
    let status = ServerStatus::new("worker-a", 4, 15, clock.now_utc());
    let hb = Heartbeat::new(storage.clone(), server_id, clock.clone());

    hb.announce(ServerStatus { id: server_id, ..status }).await.unwrap();
    clock.advance(std::time::Duration::from_secs(10));
    hb.beat(2).await.unwrap();

    let servers = storage.get_servers().await.unwrap();
    assert_eq!(servers[0].last_heartbeat, clock.now_utc());
    assert_eq!(servers[0].running_job_count, 2);
}

#[tokio::test]
async fn orphan_detector_reclaims_only_jobs_owned_by_timed_out_servers() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();

    let dead = ServerStatus::new("dead", 4, 15, clock.now_utc());
    let alive = ServerStatus::new("alive", 4, 15, clock.now_utc());
    let dead_id = dead.id;
    let alive_id = alive.id;
    storage.announce_server(dead).await.unwrap();
    storage.announce_server(alive).await.unwrap();

    let mut stuck = Job::new(descriptor(), JobState::enqueued(clock.now_utc())).unwrap();
    stuck.push_state(JobState::processing(clock.now_utc(), dead_id.to_string())).unwrap();
    storage.save(stuck.clone()).await.unwrap();

    let mut running = Job::new(descriptor(), JobState::enqueued(clock.now_utc())).unwrap();
    running.push_state(JobState::processing(clock.now_utc(), alive_id.to_string())).unwrap();
    storage.save(running.clone()).await.unwrap();

    clock.advance(std::time::Duration::from_secs(40));
    storage.signal_server_alive(alive_id, clock.now_utc(), 1).await.unwrap();
    storage.heartbeat_job(running.id(), alive_id, clock.now_utc()).await.unwrap();

    let detector = OrphanDetector::new(storage.clone(), clock.clone()).with_timeout_seconds(30);
    let reclaimed = detector.tick().await.unwrap();

    assert_eq!(reclaimed, 1);
    assert_eq!(storage.get_job_by_id(stuck.id()).await.unwrap().state_kind(), JobStateKind::Scheduled);
    assert_eq!(storage.get_job_by_id(running.id()).await.unwrap().state_kind(), JobStateKind::Processing);
    assert_eq!(storage.get_servers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn orphan_detector_reclaims_a_job_whose_server_was_never_announced() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();

    // No `announce_server` call for this id at all: it never shows up in
    // `remove_timed_out_servers` either, since that only removes servers
    // that were registered and then went stale.
    let mut job = Job::new(descriptor(), JobState::enqueued(clock.now_utc())).unwrap();
    job.push_state(JobState::processing(clock.now_utc(), "ghost-server")).unwrap();
    storage.save(job.clone()).await.unwrap();

    let detector = OrphanDetector::new(storage.clone(), clock.clone()).with_timeout_seconds(30);
    let reclaimed = detector.tick().await.unwrap();

    assert_eq!(reclaimed, 1);
    assert_eq!(storage.get_job_by_id(job.id()).await.unwrap().state_kind(), JobStateKind::Scheduled);
}

#[tokio::test]
async fn orphan_detector_routes_reclaims_through_server_supplied_filters() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();

    let mut job = Job::new(descriptor(), JobState::enqueued(clock.now_utc())).unwrap();
    job.push_state(JobState::processing(clock.now_utc(), "ghost-server")).unwrap();
    storage.save(job.clone()).await.unwrap();

    let dead_letter_at = clock.now_utc() + chrono::Duration::days(1);
    let mut filters = FilterChain::new();
    filters.add(Box::new(DeadLetterFilter(dead_letter_at)));

    let detector = OrphanDetector::new(storage.clone(), clock.clone())
        .with_timeout_seconds(30)
        .with_filters(filters);
    let reclaimed = detector.tick().await.unwrap();

    assert_eq!(reclaimed, 1);
    let reloaded = storage.get_job_by_id(job.id()).await.unwrap();
    assert_eq!(reloaded.state_kind(), JobStateKind::Scheduled);
    match reloaded.current_state() {
        JobState::Scheduled { at, reason } => {
            assert_eq!(*at, dead_letter_at);
            assert_eq!(reason.as_deref(), Some("dead-lettered"));
        }
        other => panic!("expected a dead-lettered Scheduled state, got {other:?}"),
    }
}

#[tokio::test]
async fn orphan_detector_reclaims_a_stale_job_even_when_its_server_is_still_announced() {
    let storage: Arc<dyn StorageProvider> = Arc::new(SimpleStorageProvider::new());
    let clock = FakeClock::new();

    let server = ServerStatus::new("flaky", 4, 15, clock.now_utc());
    let server_id = server.id;
    storage.announce_server(server).await.unwrap();

    let mut job = Job::new(descriptor(), JobState::enqueued(clock.now_utc())).unwrap();
    job.push_state(JobState::processing(clock.now_utc(), server_id.to_string())).unwrap();
    storage.save(job.clone()).await.unwrap();

    // The server keeps renewing its own heartbeat, but never heartbeats
    // this particular job again — its `updated_at` goes stale even though
    // `server_id` stays in the live set.
    clock.advance(std::time::Duration::from_secs(40));
    storage.signal_server_alive(server_id, clock.now_utc(), 1).await.unwrap();

    let detector = OrphanDetector::new(storage.clone(), clock.clone()).with_timeout_seconds(30);
    let reclaimed = detector.tick().await.unwrap();

    assert_eq!(reclaimed, 1);
    assert_eq!(storage.get_job_by_id(job.id()).await.unwrap().state_kind(), JobStateKind::Scheduled);
    assert_eq!(storage.get_servers().await.unwrap().len(), 1, "the server itself is still alive");
}
