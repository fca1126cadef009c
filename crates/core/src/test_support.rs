// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`. This module
//! never ships in a non-test build of anything that depends on it, so the
//! workspace's panic-hygiene lints are relaxed here rather than at each
//! call site.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use chrono::{DateTime, Utc};

use crate::descriptor::JobDescriptor;
use crate::job::{Job, JobState};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core state-machine and descriptor types.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// A `job_type`/`method` name drawn from a small realistic alphabet
    /// rather than arbitrary Unicode — descriptor equality/round-trip tests
    /// care about structural correctness, not about stressing serde with
    /// pathological strings (covered separately by `serde_json`'s own
    /// property tests upstream).
    fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_.]{0,31}"
    }

    /// An arbitrary JSON scalar/array/object suitable as a descriptor
    /// argument, bounded in depth so shrinking stays fast.
    fn arb_json_value() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            ".{0,16}".prop_map(serde_json::Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::hash_map(arb_identifier(), inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// A [`JobDescriptor`] with a random `job_type`/`method` and a random
    /// number of arbitrarily-typed arguments, for the round-trip property
    /// in §8 ("encode/decode of a job descriptor ... preserves equality").
    pub fn arb_job_descriptor() -> impl Strategy<Value = JobDescriptor> {
        (
            arb_identifier(),
            arb_identifier(),
            prop::collection::vec((arb_identifier(), arb_json_value()), 0..6),
        )
            .prop_map(|(job_type, method, params)| JobDescriptor {
                job_type,
                method,
                parameter_types: params.iter().map(|(t, _)| t.clone()).collect(),
                args: params.into_iter().map(|(_, v)| v).collect(),
            })
    }
}

// ── Job factory helpers ─────────────────────────────────────────────────

/// Build a job already `Enqueued` at `at`, for tests that don't care how it
/// got there.
pub fn enqueued_job(descriptor: JobDescriptor, at: DateTime<Utc>) -> Job {
    Job::new(descriptor, JobState::enqueued(at)).expect("Enqueued is always a legal initial state")
}

/// Build a job already `Scheduled` for `at`, for tests that don't care how
/// it got there.
pub fn scheduled_job(descriptor: JobDescriptor, at: DateTime<Utc>) -> Job {
    Job::new(descriptor, JobState::scheduled(at, None)).expect("Scheduled is always a legal initial state")
}

/// Build a job already claimed `Processing` by `server_id` at `at` —
/// convenient for tests of the orphan detector and heartbeat path that want
/// to start mid-lifecycle rather than replaying every prior transition.
pub fn processing_job(descriptor: JobDescriptor, at: DateTime<Utc>, server_id: &str) -> Job {
    let mut job = enqueued_job(descriptor, at);
    job.push_state(JobState::processing(at, server_id)).expect("Enqueued -> Processing is legal");
    job
}
