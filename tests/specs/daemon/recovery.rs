// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash recovery: a restarted server resolves every non-terminal workflow
//! before accepting any work. Interrupted runs fail; rows whose executor
//! never started are cancelled.

use crate::prelude::*;
use am_core::{SystemClock, WorkflowStatus};
use am_daemon::lifecycle::{recover_interrupted, RESTART_REASON};
use am_engine::{EventBus, EventEmitter};
use am_storage::Database;
use std::sync::Arc;

fn reopen(db_path: &std::path::Path) -> (Arc<Database>, Arc<EventEmitter<SystemClock>>) {
    let db = Arc::new(Database::open(db_path).unwrap());
    let emitter = Arc::new(EventEmitter::new(Arc::clone(&db), EventBus::new(64), SystemClock));
    (db, emitter)
}

#[tokio::test]
async fn restart_fails_interrupted_workflows() {
    let s = specs();

    // Two workflows parked at their plan gates when the "crash" happens
    let first = s.start_blocked("ISSUE-1", "a").await;
    let second = s.start_blocked("ISSUE-2", "b").await;

    // Simulate the crash: reopen the same database file cold. The old
    // executors stay parked on their gates and never observe the new
    // process; their rows are what recovery sees.
    let db_path = s.dir.path().join("amelia.db");
    let (db, emitter) = reopen(&db_path);

    let recovered = recover_interrupted(&db, &emitter).unwrap();
    assert_eq!(recovered, 2);

    for id in [first, second] {
        let wf = db.get_workflow(&id).unwrap().unwrap();
        assert_eq!(wf.status, WorkflowStatus::Failed, "{id}");
        assert_eq!(wf.failure_reason.as_deref(), Some(RESTART_REASON));
        assert!(wf.completed_at_ms.is_some());
        // The recovery is recorded in the event log itself
        let last = db.events_for(&id, None).unwrap().pop().unwrap();
        assert_eq!(last.event_type, am_core::EventType::WorkflowFailed);
    }
}

#[tokio::test]
async fn restart_cancels_workflows_that_never_started() {
    let s = specs();

    // A workflow row the old process created but whose executor never got
    // to emit workflow_started. pending -> failed is not a legal
    // transition, so recovery resolves it as cancelled instead.
    let pending = am_core::Workflow::builder()
        .id(am_core::workflow::WorkflowId::from_string("wfl-unstarted"))
        .worktree_path(s.make_worktree("p"))
        .build();
    s.db.insert_workflow(&pending).unwrap();

    let db_path = s.dir.path().join("amelia.db");
    let (db, emitter) = reopen(&db_path);

    assert_eq!(recover_interrupted(&db, &emitter).unwrap(), 1);

    let wf = db.get_workflow("wfl-unstarted").unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Cancelled);
    assert_eq!(wf.failure_reason.as_deref(), Some(RESTART_REASON));
    assert!(wf.completed_at_ms.is_some());
    let last = db.events_for("wfl-unstarted", None).unwrap().pop().unwrap();
    assert_eq!(last.event_type, am_core::EventType::WorkflowCancelled);
}

#[tokio::test]
async fn recovered_worktrees_accept_new_workflows() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;
    let worktree = s.db.get_workflow(&id).unwrap().unwrap().worktree_path;

    let db_path = s.dir.path().join("amelia.db");
    let (db, emitter) = reopen(&db_path);
    recover_interrupted(&db, &emitter).unwrap();

    // The partial index sees no active row for the worktree any more
    assert!(db.workflow_for_worktree(&worktree).unwrap().is_none());
}

#[tokio::test]
async fn recovery_is_a_no_op_on_a_clean_database() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let db_path = s.dir.path().join("amelia.db");
    let (db, emitter) = reopen(&db_path);
    assert_eq!(recover_interrupted(&db, &emitter).unwrap(), 0);
}
