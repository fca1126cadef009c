// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! The retry/filter pipeline (§4.5): decides what happens after a job body
//! fails, and notifies observer filters of every state transition without
//! letting a misbehaving filter take the server down with it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jobsworth_core::{Job, JobState, JobStateKind};
use rand::Rng;
use tracing::error;

use crate::handler::HandlerError;

/// Default number of retry attempts before a job is given up on, matching
/// the common background-job-processor default of ten.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Exponential backoff with jitter: `3^(attempt+1)` seconds plus a uniform
/// `[0, 30)` second jitter, so retries spread out instead of thundering
/// back in lockstep.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let base_secs = 3i64.saturating_pow(attempt + 1);
    let jitter_secs = rand::thread_rng().gen_range(0..30);
    Duration::from_secs((base_secs + jitter_secs) as u64)
}

/// Turns a handler failure into the job's next state: another `Scheduled`
/// attempt, or a terminal `Failed`.
pub struct RetryFilter {
    max_retries: u32,
}

impl Default for RetryFilter {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES }
    }
}

impl RetryFilter {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    fn attempt_count(job: &Job) -> u32 {
        job.history().iter().filter(|s| s.kind() == JobStateKind::Failed).count() as u32
    }

    /// What state to push after `error` was raised while running `job`.
    pub fn on_failure(&self, job: &Job, now: DateTime<Utc>, error: &HandlerError) -> JobState {
        let attempt = Self::attempt_count(job);
        let exhausted = attempt + 1 >= self.max_retries;
        let do_not_retry = error.do_not_retry || exhausted;
        JobState::failed(now, error.message.clone(), error.exception.clone(), do_not_retry)
    }

    /// The `Scheduled` state to push once a `Failed` (non-terminal) job is
    /// due for another attempt.
    pub fn schedule_retry(job: &Job, now: DateTime<Utc>) -> JobState {
        let attempt = Self::attempt_count(job);
        let delay = backoff_for_attempt(attempt.saturating_sub(1));
        let retry_at = now + chrono::Duration::from_std(delay).unwrap_or_default();
        JobState::scheduled(retry_at, Some(format!("retry attempt {attempt}")))
    }
}

/// `RetryFilter` is itself just the built-in `ApplyStateFilter` (§4.10): once
/// a `Failed → Failed` non-transition is proposed to stay put (i.e. the job
/// just landed on `Failed` and nothing else has claimed the next move), it
/// rewrites that proposal into `Scheduled(now + backoff(n))`, the same way a
/// user-supplied filter would.
impl StateFilter for RetryFilter {
    fn apply_state(&self, job: &Job, previous: Option<&JobState>, next: &JobState) -> Option<JobState> {
        let previous_is_failed = matches!(previous, Some(JobState::Failed { .. }));
        match next {
            JobState::Failed { do_not_retry: false, .. } if previous_is_failed => {
                Some(Self::schedule_retry(job, next.at()))
            }
            _ => None,
        }
    }

    fn on_state_applied(&self, _job: &Job, _previous: Option<&JobState>) {}
}

/// Observes every state transition a job goes through, and — before any of
/// that — gets a chance to cancel or replace the state about to be
/// committed (§4.10). A filter that only reacts (like a metrics exporter)
/// just implements `on_state_applied`; one that participates in the
/// transition itself (like [`RetryFilter`]) also implements `apply_state`.
/// Either way a panicking filter only loses its own say, never the
/// transition or the other filters in the chain.
pub trait StateFilter: Send + Sync {
    /// Called with the state that would be persisted next, before it is.
    /// Returning `Some(replacement)` substitutes `replacement` for `next`;
    /// returning `None` leaves `next` unchanged. Default: never intervenes.
    fn apply_state(&self, job: &Job, previous: Option<&JobState>, next: &JobState) -> Option<JobState> {
        let _ = (job, previous, next);
        None
    }

    fn on_state_applied(&self, job: &Job, previous: Option<&JobState>);
}

/// Runs every registered filter for one transition, isolating panics so a
/// buggy filter can't crash the worker pool (§4.5).
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn StateFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: Box<dyn StateFilter>) {
        self.filters.push(filter);
    }

    /// Runs every filter's `apply_state` over `next` in registration order,
    /// each seeing whatever the previous filter already replaced it with.
    /// Returns `Some` only if some filter actually replaced the state —
    /// callers that get `None` back should proceed with `next` unchanged.
    pub fn apply_state(&self, job: &Job, previous: Option<&JobState>, next: &JobState) -> Option<JobState> {
        let mut replacement: Option<JobState> = None;
        for filter in &self.filters {
            let candidate = replacement.as_ref().unwrap_or(next);
            let result = catch_unwind(AssertUnwindSafe(|| filter.apply_state(job, previous, candidate)));
            match result {
                Ok(Some(replaced)) => replacement = Some(replaced),
                Ok(None) => {}
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(job_id = %job.id(), %message, "state filter panicked in apply_state, skipping");
                }
            }
        }
        replacement
    }

    pub fn notify(&self, job: &Job, previous: Option<&JobState>) {
        for filter in &self.filters {
            let result = catch_unwind(AssertUnwindSafe(|| filter.on_state_applied(job, previous)));
            if let Err(panic) = result {
                let message = panic_message(&panic);
                error!(job_id = %job.id(), %message, "state filter panicked, continuing");
            }
        }
    }
}

/// Runs the built-in [`RetryFilter`] ahead of a server-supplied
/// [`FilterChain`], letting either replace `next` before it's committed.
/// Shared by `worker_pool.rs` (handler failures) and `heartbeat.rs` (orphan
/// reclaims) so both paths apply the same filters the same way (§4.10).
pub fn apply_filters(
    retry: &RetryFilter,
    filters: &FilterChain,
    job: &Job,
    previous: Option<&JobState>,
    next: &JobState,
) -> Option<JobState> {
    let after_retry = retry.apply_state(job, previous, next);
    let candidate = after_retry.as_ref().unwrap_or(next);
    filters.apply_state(job, previous, candidate).or(after_retry)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
