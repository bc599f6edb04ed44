// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One active workflow per worktree, and the global concurrency cap.

use crate::prelude::*;
use am_engine::{EngineError, StartRequest, SupervisorConfig};
use am_core::WorkflowStatus;

#[tokio::test]
async fn starting_twice_in_one_worktree_creates_exactly_one_workflow() {
    let s = specs();
    let worktree = s.make_worktree("a");

    let first = s.supervisor.start(StartRequest::new("ISSUE-1", &worktree)).unwrap();
    let err = s.supervisor.start(StartRequest::new("ISSUE-2", &worktree)).unwrap_err();

    match err {
        EngineError::WorkflowConflict { existing_id, .. } => {
            assert_eq!(existing_id, first.id)
        }
        other => panic!("expected WORKFLOW_CONFLICT, got {other:?}"),
    }
    assert_eq!(s.db.active_count().unwrap(), 1);
}

#[tokio::test]
async fn cancelled_worktree_accepts_a_new_workflow() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.cancel(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Cancelled).await;
    wait_idle(&s).await;

    let worktree = s.dir.path().join("a");
    s.supervisor.start(StartRequest::new("ISSUE-2", &worktree)).unwrap();
}

#[tokio::test]
async fn cap_rejects_with_retry_hint_until_a_slot_frees() {
    let s = specs_with(SupervisorConfig { max_concurrent: 2, ..Default::default() });
    let id_a = s.start_blocked("ISSUE-1", "a").await;
    let _id_b = s.start_blocked("ISSUE-2", "b").await;

    let worktree_c = s.make_worktree("c");
    let err = s.supervisor.start(StartRequest::new("ISSUE-3", &worktree_c)).unwrap_err();
    match err {
        EngineError::ConcurrencyLimit { active, limit, retry_after_secs } => {
            assert_eq!((active, limit), (2, 2));
            assert!(retry_after_secs > 0);
        }
        other => panic!("expected CONCURRENCY_LIMIT, got {other:?}"),
    }

    // Completing one workflow frees a slot
    s.supervisor.approve(&id_a, None).unwrap();
    s.wait_status(&id_a, WorkflowStatus::Completed).await;
    wait_slot(&s, 1).await;

    s.supervisor.start(StartRequest::new("ISSUE-3", &worktree_c)).unwrap();
}

async fn wait_idle(s: &Specs) {
    wait_slot(s, 0).await;
}

async fn wait_slot(s: &Specs, want: usize) {
    let deadline =
        tokio::time::Instant::now() + std::time::Duration::from_millis(SPEC_WAIT_MAX_MS);
    while s.supervisor.active_count() > want {
        assert!(tokio::time::Instant::now() < deadline, "executor slot never freed");
        tokio::time::sleep(std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
}
