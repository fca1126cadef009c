// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Worker pool, pollers, retry/filter pipeline, and heartbeat machinery that
//! together make up a running job-processing server.

pub mod background_job_server;
pub mod handler;
pub mod heartbeat;
pub mod poller;
pub mod retry;
pub mod worker_pool;

pub use background_job_server::BackgroundJobServer;
pub use handler::{HandlerError, JobHandler, JobHandlerRegistry};
pub use heartbeat::{Heartbeat, OrphanDetector, DEFAULT_TIMEOUT_SECONDS};
pub use poller::{EnqueuedPoller, RecurringPoller, ScheduledPoller, DEFAULT_POLL_BATCH_SIZE};
pub use retry::{backoff_for_attempt, FilterChain, RetryFilter, StateFilter, DEFAULT_MAX_RETRIES};
pub use worker_pool::WorkerPool;
