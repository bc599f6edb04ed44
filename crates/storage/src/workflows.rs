// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow rows: the status cache over the event log.

use crate::cursor::Cursor;
use crate::db::{Database, StorageError};
use am_core::workflow::{StageVisit, Workflow, WorkflowId};
use am_core::WorkflowStatus;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Status / worktree filters for listing.
#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub status: Option<WorkflowStatus>,
    pub worktree: Option<PathBuf>,
}

/// One page of a cursor-paginated listing, newest first.
#[derive(Debug, Clone)]
pub struct WorkflowPage {
    pub workflows: Vec<Workflow>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

const COLUMNS: &str = "id, issue_id, worktree_path, worktree_name, pipeline, status, \
     created_at_ms, started_at_ms, completed_at_ms, current_stage, failure_reason, state_blob";

impl Database {
    /// Insert a new workflow row.
    ///
    /// The partial unique index enforces one active workflow per worktree; a
    /// violation is reported as [`StorageError::WorktreeConflict`] carrying
    /// the existing workflow's identity.
    pub fn insert_workflow(&self, wf: &Workflow) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let blob = state_blob_json(wf)?;
        let result = conn.execute(
            "INSERT INTO workflows (id, issue_id, worktree_path, worktree_name, pipeline, status, \
             created_at_ms, started_at_ms, completed_at_ms, current_stage, failure_reason, state_blob) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                wf.id.as_str(),
                wf.issue_id,
                path_str(&wf.worktree_path),
                wf.worktree_name,
                wf.pipeline,
                wf.status.as_str(),
                wf.created_at_ms as i64,
                wf.started_at_ms.map(|v| v as i64),
                wf.completed_at_ms.map(|v| v as i64),
                wf.current_stage,
                wf.failure_reason,
                blob,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                match find_active_for_worktree(&conn, &wf.worktree_path)? {
                    Some(existing) => Err(StorageError::WorktreeConflict {
                        worktree_path: wf.worktree_path.clone(),
                        existing_id: existing.id,
                        existing_status: existing.status,
                    }),
                    // Unique violation on the primary key, not the index
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, StorageError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM workflows WHERE id = ?1"),
            params![id],
            row_to_workflow,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Just the cached status, without hydrating the whole record.
    pub fn workflow_status(&self, id: &str) -> Result<Option<WorkflowStatus>, StorageError> {
        let conn = self.conn.lock();
        let status: Option<String> = conn
            .query_row("SELECT status FROM workflows WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        match status {
            None => Ok(None),
            Some(text) => Ok(Some(
                WorkflowStatus::from_str(&text).map_err(StorageError::CorruptRow)?,
            )),
        }
    }

    /// The active workflow for a worktree, if any.
    pub fn workflow_for_worktree(&self, path: &Path) -> Result<Option<Workflow>, StorageError> {
        let conn = self.conn.lock();
        find_active_for_worktree(&conn, path)
    }

    /// All workflows in an active status.
    pub fn active_workflows(&self) -> Result<Vec<Workflow>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM workflows \
             WHERE status IN ('pending', 'in_progress', 'blocked') \
             ORDER BY created_at_ms"
        ))?;
        let rows = stmt.query_map([], row_to_workflow)?;
        collect(rows)
    }

    pub fn active_count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM workflows WHERE status IN ('pending', 'in_progress', 'blocked')",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Cursor-paginated listing, newest `started_at_ms` first.
    pub fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        limit: usize,
        cursor: Option<&Cursor>,
    ) -> Result<WorkflowPage, StorageError> {
        let conn = self.conn.lock();

        let mut sql = format!("SELECT {COLUMNS} FROM workflows WHERE 1=1");
        let mut args: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(status.as_str().to_string().into());
        }
        if let Some(worktree) = &filter.worktree {
            sql.push_str(" AND worktree_path = ?");
            args.push(path_str(worktree).into());
        }
        if let Some(cursor) = cursor {
            sql.push_str(
                " AND (COALESCE(started_at_ms, 0) < ? \
                 OR (COALESCE(started_at_ms, 0) = ? AND id < ?))",
            );
            args.push((cursor.started_at_ms as i64).into());
            args.push((cursor.started_at_ms as i64).into());
            args.push(cursor.id.clone().into());
        }
        sql.push_str(" ORDER BY COALESCE(started_at_ms, 0) DESC, id DESC LIMIT ?");
        // Fetch one past the page to learn whether more rows exist.
        args.push(((limit + 1) as i64).into());

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args), row_to_workflow)?;
        let mut workflows = collect(rows)?;

        let has_more = workflows.len() > limit;
        workflows.truncate(limit);
        let cursor = if has_more {
            workflows.last().map(|wf| {
                Cursor {
                    started_at_ms: wf.started_at_ms.unwrap_or(0),
                    id: wf.id.to_string(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(WorkflowPage { workflows, has_more, cursor })
    }

    /// Move the status cache, validating through the transition table.
    ///
    /// Runs in an IMMEDIATE transaction so the read-validate-write is atomic
    /// against concurrent emitters. Terminal statuses set `completed_at_ms`.
    pub fn set_status(
        &self,
        id: &str,
        new_status: WorkflowStatus,
        failure_reason: Option<&str>,
        now_ms: u64,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
            .query_row("SELECT status FROM workflows WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        let current = current.ok_or_else(|| StorageError::WorkflowNotFound(id.to_string()))?;
        let current = WorkflowStatus::from_str(&current)
            .map_err(StorageError::CorruptRow)?;

        WorkflowStatus::validate_transition(current, new_status)?;

        let completed_at_ms = new_status.is_terminal().then_some(now_ms as i64);
        let started_at_ms =
            (new_status == WorkflowStatus::InProgress).then_some(now_ms as i64);
        tx.execute(
            "UPDATE workflows SET status = ?2, \
             failure_reason = COALESCE(?3, failure_reason), \
             completed_at_ms = COALESCE(?4, completed_at_ms), \
             started_at_ms = COALESCE(started_at_ms, ?5) \
             WHERE id = ?1",
            params![id, new_status.as_str(), failure_reason, completed_at_ms, started_at_ms],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Update only the current-stage column (stage_started cache effect).
    pub fn set_current_stage(&self, id: &str, stage: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE workflows SET current_stage = ?2 WHERE id = ?1",
            params![id, stage],
        )?;
        if changed == 0 {
            return Err(StorageError::WorkflowNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Update the derived-state columns and opaque blob between pipeline nodes.
    pub fn update_workflow_state(
        &self,
        id: &str,
        current_stage: Option<&str>,
        state_blob: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE workflows SET current_stage = ?2, state_blob = ?3 WHERE id = ?1",
            params![id, current_stage, serde_json::to_string(state_blob)?],
        )?;
        if changed == 0 {
            return Err(StorageError::WorkflowNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Raw state blob for a workflow (pipeline-private resume state).
    pub fn workflow_state_blob(&self, id: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let conn = self.conn.lock();
        let blob: Option<Option<String>> = conn
            .query_row("SELECT state_blob FROM workflows WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        match blob {
            None => Err(StorageError::WorkflowNotFound(id.to_string())),
            Some(None) => Ok(None),
            Some(Some(text)) => Ok(Some(serde_json::from_str(&text)?)),
        }
    }
}

fn find_active_for_worktree(
    conn: &Connection,
    path: &Path,
) -> Result<Option<Workflow>, StorageError> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM workflows \
             WHERE worktree_path = ?1 AND status IN ('pending', 'in_progress', 'blocked')"
        ),
        params![path_str(path)],
        row_to_workflow,
    )
    .optional()
    .map_err(Into::into)
}

pub(crate) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn collect(
    rows: impl Iterator<Item = Result<Workflow, rusqlite::Error>>,
) -> Result<Vec<Workflow>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Serialise the parts of the record that live in the opaque blob.
fn state_blob_json(wf: &Workflow) -> Result<String, StorageError> {
    Ok(serde_json::to_string(&serde_json::json!({ "stages": wf.stages }))?)
}

fn row_to_workflow(row: &Row<'_>) -> Result<Workflow, rusqlite::Error> {
    let id: String = row.get(0)?;
    let status: String = row.get(5)?;
    let status = WorkflowStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    let worktree_path: String = row.get(2)?;
    let blob: Option<String> = row.get(11)?;
    let stages: Vec<StageVisit> = blob
        .as_deref()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .and_then(|v| v.get("stages").cloned())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    Ok(Workflow {
        id: WorkflowId::from_string(id),
        issue_id: row.get(1)?,
        worktree_path: PathBuf::from(worktree_path),
        worktree_name: row.get(3)?,
        pipeline: row.get(4)?,
        status,
        created_at_ms: row.get::<_, i64>(6)? as u64,
        started_at_ms: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        completed_at_ms: row.get::<_, Option<i64>>(8)?.map(|v| v as u64),
        current_stage: row.get(9)?,
        failure_reason: row.get(10)?,
        stages,
    })
}

#[cfg(test)]
#[path = "workflows_tests.rs"]
mod tests;
