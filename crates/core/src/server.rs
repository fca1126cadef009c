// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Server registry records (§4.7): what each `BackgroundJobServer` instance
//! announces about itself, and the master-election rule derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifies one running `BackgroundJobServer` process.
    pub struct ServerId("srv-");
}

/// A server's self-reported status, written on startup and refreshed by the
/// heartbeat loop (§4.7). `first_heartbeat` never changes after creation —
/// it is the tiebreak-free ordering key used for master election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub id: ServerId,
    pub name: String,
    pub worker_pool_size: usize,
    pub poll_interval_seconds: u64,
    pub first_heartbeat: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub running_job_count: usize,
    pub is_running: bool,
}

impl ServerStatus {
    pub fn new(name: impl Into<String>, worker_pool_size: usize, poll_interval_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: ServerId::new(),
            name: name.into(),
            worker_pool_size,
            poll_interval_seconds,
            first_heartbeat: now,
            last_heartbeat: now,
            running_job_count: 0,
            is_running: true,
        }
    }

    /// Refresh `last_heartbeat`, leaving the rest of the record untouched —
    /// mirrors the `signalAlive` operation in the storage contract (§4.1).
    pub fn signal_alive(&mut self, now: DateTime<Utc>, running_job_count: usize) {
        self.last_heartbeat = now;
        self.running_job_count = running_job_count;
    }

    /// A server is timed out once its heartbeat is older than
    /// `timeout_seconds`, the threshold an orphan detector uses to reclaim
    /// its in-flight jobs (§4.7).
    pub fn is_timed_out(&self, now: DateTime<Utc>, timeout_seconds: i64) -> bool {
        (now - self.last_heartbeat).num_seconds() > timeout_seconds
    }
}

/// Determine which of a set of live servers is master: the one with the
/// earliest `first_heartbeat`, ties broken by the lexicographically smaller
/// `ServerId` so the choice is deterministic across servers that started in
/// the same instant (§4.7).
pub fn elect_master(servers: &[ServerStatus]) -> Option<ServerId> {
    servers
        .iter()
        .min_by(|a, b| {
            a.first_heartbeat
                .cmp(&b.first_heartbeat)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        })
        .map(|s| s.id)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
