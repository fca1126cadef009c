// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use jobsworth_core::{JobId, JobStateError, ServerId};
use thiserror::Error;

/// Failures raised by a [`crate::StorageProvider`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("server {0} not found")]
    ServerNotFound(ServerId),

    /// The caller's `job.version()` didn't line up with what storage has on
    /// record — someone else saved a newer state for this job first (§4.1).
    #[error("concurrent modification on job {job_id}: expected prior version {expected}, storage has {actual}")]
    ConcurrentModification { job_id: JobId, expected: u64, actual: u64 },

    #[error(transparent)]
    InvalidStateTransition(#[from] JobStateError),
}
