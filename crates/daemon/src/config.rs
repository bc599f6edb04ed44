// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.

use crate::env;
use crate::lifecycle::LifecycleError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration: fixed paths under the state dir plus tunables,
/// each overridable through an `AMELIA_*` environment variable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/amelia)
    pub state_dir: PathBuf,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log directory
    pub log_dir: PathBuf,
    /// HTTP/WebSocket listen address
    pub bind_addr: SocketAddr,

    /// Global cap on concurrently active workflows
    pub max_concurrent: usize,
    /// Retry-After hint on 429 responses, seconds
    pub retry_after_secs: u64,
    /// Review cycles per task before the workflow fails
    pub max_review_iterations: u32,
    /// Worktree health check interval
    pub check_interval: Duration,
    /// How long shutdown waits for executors to finish or block
    pub shutdown_timeout: Duration,
    /// Grace per executor when shutdown cancels stragglers
    pub executor_grace: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// WebSocket heartbeat interval
    pub ws_heartbeat: Duration,
    /// WebSocket idle timeout
    pub ws_idle_timeout: Duration,
    /// Event bus queue depth
    pub bus_capacity: usize,
    /// Retention: drop terminal workflows older than this many days
    pub retention_days: u32,
    /// Retention: per-workflow event cap
    pub max_events_per_workflow: u64,
    /// Events included in a workflow detail response
    pub recent_events_limit: usize,
    /// Default and maximum page size for listings
    pub list_default_limit: usize,
    pub list_max_limit: usize,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/amelia/` (or
    /// `$XDG_STATE_HOME/amelia/`). One daemon serves all worktrees for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self::at(state_dir))
    }

    /// Configuration rooted at an explicit state dir (tests use a temp dir).
    pub fn at(state_dir: PathBuf) -> Self {
        Self {
            db_path: state_dir.join("amelia.db"),
            lock_path: state_dir.join("ameliad.pid"),
            log_dir: state_dir.join("logs"),
            bind_addr: env::bind_addr(),
            max_concurrent: env::usize_var("AMELIA_MAX_CONCURRENT").unwrap_or(3),
            retry_after_secs: env::u64_var("AMELIA_RETRY_AFTER_SECS").unwrap_or(30),
            max_review_iterations: env::u64_var("AMELIA_MAX_REVIEW_ITERATIONS")
                .map(|v| v as u32)
                .unwrap_or(3),
            check_interval: Duration::from_secs(
                env::u64_var("AMELIA_CHECK_INTERVAL_SECS").unwrap_or(30),
            ),
            shutdown_timeout: Duration::from_secs(
                env::u64_var("AMELIA_SHUTDOWN_TIMEOUT_SECS").unwrap_or(30),
            ),
            executor_grace: Duration::from_secs(
                env::u64_var("AMELIA_EXECUTOR_GRACE_SECS").unwrap_or(5),
            ),
            request_timeout: Duration::from_secs(
                env::u64_var("AMELIA_REQUEST_TIMEOUT_SECS").unwrap_or(30),
            ),
            ws_heartbeat: Duration::from_secs(
                env::u64_var("AMELIA_WS_HEARTBEAT_SECS").unwrap_or(30),
            ),
            ws_idle_timeout: Duration::from_secs(
                env::u64_var("AMELIA_WS_IDLE_TIMEOUT_SECS").unwrap_or(300),
            ),
            bus_capacity: env::usize_var("AMELIA_BUS_CAPACITY").unwrap_or(1024),
            retention_days: env::u64_var("AMELIA_RETENTION_DAYS").map(|v| v as u32).unwrap_or(30),
            max_events_per_workflow: env::u64_var("AMELIA_MAX_EVENTS_PER_WORKFLOW")
                .unwrap_or(100_000),
            recent_events_limit: env::usize_var("AMELIA_RECENT_EVENTS_LIMIT").unwrap_or(50),
            list_default_limit: 20,
            list_max_limit: 100,
            state_dir,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
