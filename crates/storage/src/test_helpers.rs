// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for storage tests.

use crate::db::Database;
use am_core::workflow::{Workflow, WorkflowId};
use tempfile::TempDir;

/// Open a fresh database in a temp dir. Keep the guard alive for the test.
pub(crate) fn test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("amelia.db")).unwrap();
    (dir, db)
}

/// Insert a pending workflow with the given id and worktree path.
pub(crate) fn insert_workflow(db: &Database, id: &str, worktree: &str) -> Workflow {
    let wf = Workflow::builder()
        .id(WorkflowId::from_string(id))
        .worktree_path(std::path::PathBuf::from(worktree))
        .build();
    db.insert_workflow(&wf).unwrap();
    wf
}
