// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle and connection policy.

use am_core::status::InvalidStateTransition;
use am_core::workflow::WorkflowId;
use am_core::WorkflowStatus;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The partial unique index rejected a second active workflow for a
    /// worktree. Carries the existing workflow for conflict reporting.
    #[error("worktree {worktree_path} already has active workflow {existing_id} ({existing_status})")]
    WorktreeConflict {
        worktree_path: PathBuf,
        existing_id: WorkflowId,
        existing_status: WorkflowStatus,
    },

    /// `(workflow_id, sequence)` collision: a sequence allocator bug,
    /// fatal to the emitting executor.
    #[error("duplicate event sequence {sequence} for workflow {workflow_id}")]
    DuplicateSequence { workflow_id: WorkflowId, sequence: u64 },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidStateTransition),

    #[error("invalid cursor: {0}")]
    BadCursor(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl StorageError {
    /// Classification for the transport boundary.
    pub fn kind(&self) -> am_core::ErrorKind {
        match self {
            StorageError::WorkflowNotFound(_) => am_core::ErrorKind::NotFound,
            StorageError::WorktreeConflict { .. } => am_core::ErrorKind::WorkflowConflict,
            StorageError::InvalidTransition(_) => am_core::ErrorKind::InvalidState,
            StorageError::BadCursor(_) => am_core::ErrorKind::InvalidRequest,
            StorageError::Sqlite(_)
            | StorageError::Io(_)
            | StorageError::Json(_)
            | StorageError::DuplicateSequence { .. }
            | StorageError::CorruptRow(_) => am_core::ErrorKind::InternalError,
        }
    }
}

/// Shared SQLite handle.
///
/// One connection guarded by a mutex; all operations are short local I/O, so
/// the guard is never held across anything slower than the statement itself.
pub struct Database {
    pub(crate) conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and bring the schema current.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        configure(&conn)?;

        let applied = crate::migrations::apply(&conn)?;
        if applied > 0 {
            info!(path = %path.display(), applied, "applied schema migrations");
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Current schema version (0 when no migration has been applied).
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let conn = self.conn.lock();
        let version = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(version)
    }

    /// Reclaim space after retention deletes. Must run outside a transaction.
    pub fn vacuum(&self) -> Result<(), StorageError> {
        self.conn.lock().execute_batch("VACUUM")?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    // journal_mode returns the resulting mode as a row; read it instead of
    // treating the pragma as a statement.
    let _mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
