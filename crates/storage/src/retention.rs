// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown-time retention: prune old terminal workflows and cap per-workflow
//! event counts. Runs only during graceful shutdown to keep runtime I/O flat.

use crate::db::{Database, StorageError};
use rusqlite::params;
use tracing::info;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Retention policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Terminal workflows older than this are dropped entirely.
    pub retention_days: u32,
    /// Surviving workflows keep at most this many (highest-sequence) events.
    pub max_events_per_workflow: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { retention_days: 30, max_events_per_workflow: 100_000 }
    }
}

/// Counts for operator observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub workflows_deleted: usize,
    pub events_deleted: usize,
    pub events_trimmed: usize,
}

impl Database {
    /// Apply the retention policy and reclaim space.
    pub fn run_retention(
        &self,
        policy: &RetentionPolicy,
        now_ms: u64,
    ) -> Result<RetentionReport, StorageError> {
        let mut report = RetentionReport::default();
        let cutoff_ms = now_ms.saturating_sub(policy.retention_days as u64 * DAY_MS);

        {
            let conn = self.conn.lock();

            // Count the events that will cascade before deleting their workflows.
            let events_deleted: i64 = conn.query_row(
                "SELECT COUNT(*) FROM events WHERE workflow_id IN ( \
                 SELECT id FROM workflows \
                 WHERE status IN ('completed', 'failed', 'cancelled') \
                 AND completed_at_ms IS NOT NULL AND completed_at_ms < ?1)",
                params![cutoff_ms as i64],
                |row| row.get(0),
            )?;
            report.events_deleted = events_deleted as usize;

            report.workflows_deleted = conn.execute(
                "DELETE FROM workflows \
                 WHERE status IN ('completed', 'failed', 'cancelled') \
                 AND completed_at_ms IS NOT NULL AND completed_at_ms < ?1",
                params![cutoff_ms as i64],
            )?;

            // Trim the lowest sequences of any workflow over the cap.
            let over_cap: Vec<(String, u64)> = {
                let mut stmt = conn.prepare(
                    "SELECT workflow_id, MAX(sequence) FROM events \
                     GROUP BY workflow_id HAVING COUNT(*) > ?1",
                )?;
                let rows = stmt.query_map(
                    params![policy.max_events_per_workflow as i64],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)),
                )?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                out
            };

            for (workflow_id, max_seq) in over_cap {
                let keep_from = max_seq.saturating_sub(policy.max_events_per_workflow) + 1;
                report.events_trimmed += conn.execute(
                    "DELETE FROM events WHERE workflow_id = ?1 AND sequence < ?2",
                    params![workflow_id, keep_from as i64],
                )?;
            }
        }

        if report != RetentionReport::default() {
            self.vacuum()?;
        }

        info!(
            workflows_deleted = report.workflows_deleted,
            events_deleted = report.events_deleted,
            events_trimmed = report.events_trimmed,
            "retention complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
