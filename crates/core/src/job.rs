// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! The [`Job`] entity and its append-only state history (§4.2).
//!
//! A job never overwrites its past: every transition pushes a new
//! [`JobState`] onto `history` rather than mutating one in place. `version`
//! counts both history entries and heartbeat refreshes and doubles as the
//! optimistic-concurrency token a storage provider checks on `save` (§4.1) —
//! a job that has never been saved reports `version() == 1` the moment its
//! initial state is pushed, so a provider treats `stored == None &&
//! job.version() == 1` as the create path and otherwise requires
//! `stored.version == job.version() - 1`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::JobDescriptor;
use crate::error::JobStateError;

crate::define_id! {
    /// Identifies a single job instance, distinct across repeated enqueues
    /// of structurally-identical [`JobDescriptor`]s.
    pub struct JobId("job-");
}

/// Tag-only mirror of [`JobState`]'s variants, used wherever only the kind
/// (not the payload) matters: transition tables, filters, storage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStateKind {
    Scheduled,
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Deleted,
}

impl std::fmt::Display for JobStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStateKind::Scheduled => "SCHEDULED",
            JobStateKind::Enqueued => "ENQUEUED",
            JobStateKind::Processing => "PROCESSING",
            JobStateKind::Succeeded => "SUCCEEDED",
            JobStateKind::Failed => "FAILED",
            JobStateKind::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// One entry in a job's state history. Each variant carries the wall-clock
/// time the transition took effect, plus whatever payload that state needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobState {
    /// Waiting for `at` to elapse before moving to `Enqueued`.
    Scheduled { at: DateTime<Utc>, reason: Option<String> },
    /// Waiting for a worker slot.
    Enqueued { at: DateTime<Utc> },
    /// Claimed by `server_id` and currently running.
    Processing { at: DateTime<Utc>, server_id: String },
    /// Ran to completion without error.
    Succeeded { at: DateTime<Utc>, latency_ms: i64 },
    /// Raised an error. `do_not_retry` is set by a filter that has decided
    /// no further retry should be scheduled (§4.5).
    Failed { at: DateTime<Utc>, message: String, exception: Option<String>, do_not_retry: bool },
    /// Removed by user action; never runs again.
    Deleted { at: DateTime<Utc>, reason: Option<String> },
}

impl JobState {
    pub fn scheduled(at: DateTime<Utc>, reason: impl Into<Option<String>>) -> Self {
        JobState::Scheduled { at, reason: reason.into() }
    }

    pub fn enqueued(at: DateTime<Utc>) -> Self {
        JobState::Enqueued { at }
    }

    pub fn processing(at: DateTime<Utc>, server_id: impl Into<String>) -> Self {
        JobState::Processing { at, server_id: server_id.into() }
    }

    pub fn succeeded(at: DateTime<Utc>, latency_ms: i64) -> Self {
        JobState::Succeeded { at, latency_ms }
    }

    pub fn failed(
        at: DateTime<Utc>,
        message: impl Into<String>,
        exception: impl Into<Option<String>>,
        do_not_retry: bool,
    ) -> Self {
        JobState::Failed {
            at,
            message: message.into(),
            exception: exception.into(),
            do_not_retry,
        }
    }

    pub fn deleted(at: DateTime<Utc>, reason: impl Into<Option<String>>) -> Self {
        JobState::Deleted { at, reason: reason.into() }
    }

    pub fn kind(&self) -> JobStateKind {
        match self {
            JobState::Scheduled { .. } => JobStateKind::Scheduled,
            JobState::Enqueued { .. } => JobStateKind::Enqueued,
            JobState::Processing { .. } => JobStateKind::Processing,
            JobState::Succeeded { .. } => JobStateKind::Succeeded,
            JobState::Failed { .. } => JobStateKind::Failed,
            JobState::Deleted { .. } => JobStateKind::Deleted,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            JobState::Scheduled { at, .. }
            | JobState::Enqueued { at }
            | JobState::Processing { at, .. }
            | JobState::Succeeded { at, .. }
            | JobState::Failed { at, .. }
            | JobState::Deleted { at, .. } => *at,
        }
    }

    fn is_terminal(&self) -> bool {
        match self {
            JobState::Succeeded { .. } | JobState::Deleted { .. } => true,
            JobState::Failed { do_not_retry, .. } => *do_not_retry,
            _ => false,
        }
    }
}

/// Legal edges of the job state machine (§4.2). `None` as `from` means "the
/// job's very first state".
fn is_legal_transition(from: Option<JobStateKind>, to: JobStateKind) -> bool {
    use JobStateKind::*;
    match (from, to) {
        (None, Scheduled | Enqueued) => true,
        (Some(Scheduled), Enqueued | Deleted) => true,
        (Some(Enqueued), Processing | Deleted) => true,
        (Some(Processing), Succeeded | Failed | Deleted) => true,
        (Some(Failed), Scheduled | Deleted) => true,
        _ => false,
    }
}

/// A unit of deferred work and its full history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    descriptor: JobDescriptor,
    labels: Vec<String>,
    /// Open key-value notes the running job body can write via its
    /// `JobContext` (progress reports, diagnostic breadcrumbs). Merged in by
    /// the worker pool after each run; never interpreted by the core itself.
    #[serde(default)]
    metadata: HashMap<String, String>,
    history: Vec<JobState>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Number of pure `updated_at` refreshes (§4.8 heartbeats) applied since
    /// creation. Counted into `version` so a heartbeat write participates in
    /// the same optimistic-concurrency protocol as a state transition.
    #[serde(default)]
    heartbeat_count: u64,
}

impl Job {
    /// Construct a brand-new job, pushing `initial` as its first state.
    /// `initial` must be `Scheduled` or `Enqueued` — anything else is a
    /// programmer error, since no job can start life already `Processing`,
    /// `Succeeded`, `Failed`, or `Deleted`.
    pub fn new(descriptor: JobDescriptor, initial: JobState) -> Result<Self, JobStateError> {
        let at = initial.at();
        let mut job = Self {
            id: JobId::new(),
            descriptor,
            labels: Vec::new(),
            metadata: HashMap::new(),
            history: Vec::new(),
            created_at: at,
            updated_at: at,
            heartbeat_count: 0,
        };
        job.push_state(initial)?;
        Ok(job)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Merge a run's metadata snapshot into this job's persisted metadata,
    /// overwriting any keys the snapshot also sets.
    pub fn merge_metadata(&mut self, snapshot: HashMap<String, String>) {
        self.metadata.extend(snapshot);
    }

    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// When this job was first created (the `at` of its very first state).
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When this job was last mutated, including pure heartbeat refreshes
    /// that leave `history`/`state` untouched (§3, §4.8). Storage providers
    /// order `getJobs` pages by this field, not by the current state's `at`.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of states pushed onto this job plus heartbeat refreshes
    /// applied since creation — the optimistic-concurrency token storage
    /// providers check on `save` (§4.1, §8 invariant 1).
    pub fn version(&self) -> u64 {
        self.history.len() as u64 + self.heartbeat_count
    }

    pub fn current_state(&self) -> &JobState {
        self.history.last().expect("a constructed Job always has at least one state")
    }

    pub fn state_kind(&self) -> JobStateKind {
        self.current_state().kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.history.last().map(JobState::is_terminal).unwrap_or(false)
    }

    /// Append `to` as the job's new current state, enforcing the transition
    /// table and terminal-state lock.
    pub fn push_state(&mut self, to: JobState) -> Result<(), JobStateError> {
        if self.is_terminal() {
            return Err(JobStateError::Terminal(self.id));
        }
        let from = self.history.last().map(JobState::kind);
        let to_kind = to.kind();
        if !is_legal_transition(from, to_kind) {
            return Err(JobStateError::IllegalTransition { job_id: self.id, from, to: to_kind });
        }
        self.updated_at = to.at();
        self.history.push(to);
        Ok(())
    }

    /// Like [`Job::push_state`], but additionally enforces invariant (4): a
    /// `Processing` job may only be advanced to `Succeeded` or `Failed` by
    /// the server whose id matches the current `Processing` record's
    /// `server_id`. Transitions out of any other state ignore `by`, since
    /// only `Processing -> {Succeeded, Failed}` is owner-restricted (§3).
    pub fn push_state_owned(&mut self, to: JobState, by: &str) -> Result<(), JobStateError> {
        if let JobState::Processing { server_id, .. } = self.current_state() {
            if matches!(to.kind(), JobStateKind::Succeeded | JobStateKind::Failed) && server_id != by {
                return Err(JobStateError::NotOwner {
                    job_id: self.id,
                    owner: server_id.clone(),
                    attempted_by: by.to_string(),
                });
            }
        }
        self.push_state(to)
    }

    /// The heartbeat operation of §4.8: refresh `updated_at` without
    /// appending to `history` or changing `state`. Valid only while the job
    /// is `Processing` and owned by `by` — a server has no business
    /// heartbeating a job it doesn't hold, or one that already finished.
    pub fn touch_owned(&mut self, now: DateTime<Utc>, by: &str) -> Result<(), JobStateError> {
        match self.current_state() {
            JobState::Processing { server_id, .. } if server_id == by => {
                self.updated_at = now;
                self.heartbeat_count += 1;
                Ok(())
            }
            JobState::Processing { server_id, .. } => Err(JobStateError::NotOwner {
                job_id: self.id,
                owner: server_id.clone(),
                attempted_by: by.to_string(),
            }),
            _ => Err(JobStateError::NotProcessing(self.id)),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
