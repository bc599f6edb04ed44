// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A worktree that disappears mid-run gets its workflow cancelled and
//! becomes available again once recreated.

use crate::prelude::*;
use am_core::{EventType, WorkflowStatus};
use am_engine::{StartRequest, WorktreeHealthMonitor};
use std::time::Duration;

#[tokio::test]
async fn monitor_cancels_workflow_of_a_deleted_worktree() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "doomed").await;
    let monitor = WorktreeHealthMonitor::spawn(s.supervisor.clone(), Duration::from_millis(20));

    let worktree = s.db.get_workflow(&id).unwrap().unwrap().worktree_path;
    std::fs::remove_dir_all(&worktree).unwrap();

    s.wait_status(&id, WorkflowStatus::Cancelled).await;
    monitor.stop().await;

    let wf = s.db.get_workflow(&id).unwrap().unwrap();
    assert_eq!(
        wf.failure_reason.as_deref(),
        Some("Worktree directory no longer exists")
    );
    let last = s.event_types(&id).pop().unwrap();
    assert_eq!(last, EventType::WorkflowCancelled);
}

#[tokio::test]
async fn worktree_is_reusable_after_the_cancellation() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "doomed").await;
    let monitor = WorktreeHealthMonitor::spawn(s.supervisor.clone(), Duration::from_millis(20));

    let worktree = s.db.get_workflow(&id).unwrap().unwrap().worktree_path;
    std::fs::remove_dir_all(&worktree).unwrap();
    s.wait_status(&id, WorkflowStatus::Cancelled).await;
    monitor.stop().await;

    // Wait for the executor slot to release, recreate the worktree, restart
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    while s.supervisor.active_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
    std::fs::create_dir_all(worktree.join(".git")).unwrap();

    let second = s.supervisor.start(StartRequest::new("ISSUE-2", &worktree)).unwrap();
    s.wait_status(&second.id.to_string(), WorkflowStatus::Blocked).await;
}
