// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! [`ServerConfig`]: the CLI/configuration surface (§6) a `serve` invocation
//! reads its knobs from — CLI flags first, falling back to `JOBSWORTH_*`
//! environment variables, falling back to the documented defaults.

use clap::Args;

/// Runtime tuning for one `BackgroundJobServer` process.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Number of jobs this server runs concurrently. Defaults to the
    /// number of available CPUs.
    #[arg(long, env = "JOBSWORTH_WORKER_POOL_SIZE")]
    pub worker_pool_size: Option<usize>,

    /// Seconds between poller ticks. Minimum 5, default 15 (§6).
    #[arg(long, env = "JOBSWORTH_POLL_INTERVAL_SECONDS", default_value_t = 15)]
    pub poll_interval_seconds: u64,

    /// A `Processing` job is orphaned once its heartbeat is older than
    /// `poll_interval_seconds * this multiplicand` (§3 invariant 5 uses 2x;
    /// the default here matches the documented default of 4 for the
    /// registry's own timeout, which is more conservative).
    #[arg(long, env = "JOBSWORTH_SERVER_TIMEOUT_MULTIPLICAND", default_value_t = 4)]
    pub server_timeout_poll_interval_multiplicand: u64,

    /// Human-readable server name shown in the registry and logs.
    #[arg(long, env = "JOBSWORTH_SERVER_NAME", default_value = "jobsworth")]
    pub server_name: String,
}

impl ServerConfig {
    /// Resolved worker pool size: the flag/env value if set, otherwise the
    /// host's available parallelism (falling back to 1 if that can't be
    /// determined).
    pub fn resolved_worker_pool_size(&self) -> usize {
        self.worker_pool_size.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }

    /// Poll interval clamped to the documented minimum of 5 seconds.
    pub fn resolved_poll_interval_seconds(&self) -> u64 {
        self.poll_interval_seconds.max(5)
    }

    /// The heartbeat timeout an `OrphanDetector` should use: poll interval
    /// times the configured multiplicand.
    pub fn server_timeout_seconds(&self) -> i64 {
        (self.resolved_poll_interval_seconds() * self.server_timeout_poll_interval_multiplicand) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_is_clamped_to_minimum_five() {
        let config = ServerConfig {
            worker_pool_size: None,
            poll_interval_seconds: 1,
            server_timeout_poll_interval_multiplicand: 4,
            server_name: "test".into(),
        };
        assert_eq!(config.resolved_poll_interval_seconds(), 5);
    }

    #[test]
    fn server_timeout_multiplies_interval_by_multiplicand() {
        let config = ServerConfig {
            worker_pool_size: None,
            poll_interval_seconds: 15,
            server_timeout_poll_interval_multiplicand: 4,
            server_name: "test".into(),
        };
        assert_eq!(config.server_timeout_seconds(), 60);
    }
}
