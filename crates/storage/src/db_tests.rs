// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn open_creates_parent_dirs_and_schema() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("amelia.db");
    let db = Database::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(db.schema_version().unwrap(), 1);
}

#[test]
fn reopen_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("amelia.db");
    drop(Database::open(&path).unwrap());
    let db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), 1);
}

#[test]
fn error_kinds_map_to_boundary_codes() {
    use am_core::ErrorKind;

    assert_eq!(StorageError::WorkflowNotFound("x".into()).kind(), ErrorKind::NotFound);
    assert_eq!(
        StorageError::BadCursor("junk".into()).kind(),
        ErrorKind::InvalidRequest
    );
    assert_eq!(
        StorageError::DuplicateSequence {
            workflow_id: WorkflowId::from_string("wfl-1"),
            sequence: 2
        }
        .kind(),
        ErrorKind::InternalError
    );
}
