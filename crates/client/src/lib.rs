// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobsworth-client: the submission façade (§4.11) user processes link
//! against to enqueue, schedule, and query jobs without depending on the
//! server crate's polling/worker-pool machinery.

pub mod error;
pub mod scheduler;

pub use error::ClientError;
pub use scheduler::{JobScheduler, DEFAULT_STREAM_BATCH_SIZE};
