// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

use jobsworth_core::RecurringJobId;
use jobsworth_storage::StorageError;
use thiserror::Error;

/// Failures raised by the submission façade (§4.11).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    State(#[from] jobsworth_core::JobStateError),

    #[error(transparent)]
    Cron(#[from] jobsworth_core::CronError),

    #[error("recurring job {0} not found")]
    RecurringJobNotFound(RecurringJobId),
}
