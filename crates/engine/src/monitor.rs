// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree health monitor.
//!
//! Periodically verifies that every active worktree still exists and still
//! looks like a git worktree. A failed check cancels the workflow; the
//! executor emits `workflow_cancelled` and frees the worktree for reuse.

use crate::supervisor::Supervisor;
use am_core::Clock;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reason attached to cancellations triggered by a failed check.
pub const ORPHANED_REASON: &str = "Worktree directory no longer exists";

/// A directory is healthy when it exists and carries a `.git` marker:
/// a directory in a main repository, a file in a linked worktree.
pub fn worktree_is_healthy(path: &Path) -> bool {
    path.is_dir() && path.join(".git").exists()
}

/// Background loop checking active worktrees on an interval.
pub struct WorktreeHealthMonitor {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl WorktreeHealthMonitor {
    /// Spawn the monitor loop. The first check happens one interval in.
    pub fn spawn<C: Clock>(supervisor: Supervisor<C>, check_interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            // The immediate first tick would race startup; skip it.
            ticker.tick().await;
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => check_once(&supervisor),
                }
            }
            info!("worktree health monitor stopped");
        });

        Self { handle, cancel }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

fn check_once<C: Clock>(supervisor: &Supervisor<C>) {
    for (path, workflow_id) in supervisor.active_worktrees() {
        if worktree_is_healthy(&path) {
            continue;
        }
        warn!(
            workflow_id = %workflow_id,
            path = %path.display(),
            "worktree failed health check, cancelling workflow"
        );
        if let Err(e) =
            supervisor.cancel(workflow_id.as_str(), Some(ORPHANED_REASON.to_string()))
        {
            warn!(workflow_id = %workflow_id, error = %e, "failed to cancel orphaned workflow");
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
