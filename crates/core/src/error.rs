// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Errors raised while mutating a [`crate::job::Job`]'s state machine.

use crate::job::{JobId, JobStateKind};
use thiserror::Error;

/// A state-machine violation on a [`crate::job::Job`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobStateError {
    /// The requested transition is not one of the legal edges in §4.2.
    #[error("illegal transition for job {job_id}: {from:?} -> {to:?}")]
    IllegalTransition { job_id: JobId, from: Option<JobStateKind>, to: JobStateKind },

    /// The job is already in a terminal state (`Succeeded`, `Deleted`, or a
    /// `Failed` marked `do_not_retry`) and cannot accept further transitions.
    #[error("job {0} is terminal and cannot be mutated")]
    Terminal(JobId),

    /// Only the server that holds the `Processing` record may advance it.
    #[error("job {job_id} is owned by server {owner}, not {attempted_by}")]
    NotOwner { job_id: JobId, owner: String, attempted_by: String },

    /// A heartbeat was attempted against a job that isn't currently
    /// `Processing` (already finished, or never claimed).
    #[error("job {0} is not processing and cannot be heartbeated")]
    NotProcessing(JobId),
}
