// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan → approve → implement → review → complete, with the event log as
//! the source of truth throughout.

use crate::prelude::*;
use am_core::{project, EventType, WorkflowStatus};

#[tokio::test]
async fn full_run_emits_the_documented_event_order() {
    let s = specs();
    let worktree = s.make_worktree("a");

    let workflow = s
        .supervisor
        .start(am_engine::StartRequest {
            worktree_name: Some("main".to_string()),
            ..am_engine::StartRequest::new("ISSUE-1", &worktree)
        })
        .unwrap();
    let id = workflow.id.to_string();

    s.wait_status(&id, WorkflowStatus::Blocked).await;

    // Planning ran and parked at the gate: seq 1..4 exactly as specified
    let types = s.event_types(&id);
    assert_eq!(
        &types[..4],
        &[
            EventType::WorkflowStarted,
            EventType::StageStarted,
            EventType::StageCompleted,
            EventType::ApprovalRequired,
        ]
    );

    s.supervisor.approve(&id, Some("corr-1".to_string())).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let types = s.event_types(&id);
    assert_eq!(types[4], EventType::ApprovalGranted);
    assert_eq!(*types.last().unwrap(), EventType::WorkflowCompleted);
    assert!(types.contains(&EventType::TaskStarted));
    assert!(types.contains(&EventType::TaskCompleted));

    // Dense sequence from 1
    let sequences = s.sequences(&id);
    assert_eq!(sequences, (1..=sequences.len() as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn projection_of_the_log_matches_the_status_cache() {
    let s = specs();
    let worktree = s.make_worktree("a");
    let id = s.start("ISSUE-1", &worktree);

    s.wait_status(&id, WorkflowStatus::Blocked).await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let events = s.db.events_for(&id, None).unwrap();
    let projected = project(&events).unwrap();
    let cached = s.db.get_workflow(&id).unwrap().unwrap();

    assert_eq!(projected.status, cached.status);
    assert_eq!(projected.issue_id, cached.issue_id);
    assert_eq!(projected.worktree_path, cached.worktree_path);
    assert_eq!(projected.pipeline, cached.pipeline);
    assert_eq!(projected.started_at_ms, cached.started_at_ms);
    assert_eq!(projected.completed_at_ms, cached.completed_at_ms);
}

#[tokio::test]
async fn approval_grant_carries_the_correlation_id() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;

    s.supervisor.approve(&id, Some("corr-42".to_string())).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let grant = s
        .db
        .events_for(&id, None)
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == EventType::ApprovalGranted)
        .unwrap();
    assert_eq!(grant.correlation_id.as_deref(), Some("corr-42"));
}

#[tokio::test]
async fn external_plan_skips_planning_into_validation() {
    let s = specs();
    let worktree = s.make_worktree("a");

    let workflow = s
        .supervisor
        .start(am_engine::StartRequest {
            external_plan: Some("- only step".to_string()),
            ..am_engine::StartRequest::new("ISSUE-1", &worktree)
        })
        .unwrap();
    let id = workflow.id.to_string();

    s.wait_status(&id, WorkflowStatus::Blocked).await;
    // The architect was never consulted
    assert!(s
        .driver
        .calls()
        .iter()
        .all(|c| !matches!(c, am_engine::DriverCall::ProducePlan { .. })));

    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;
}

#[tokio::test]
async fn multi_task_plans_run_tasks_in_order() {
    let s = specs();
    s.driver.plan_with_tasks(&["first", "second", "third"]);
    let id = s.start_blocked("ISSUE-1", "a").await;

    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let executed: Vec<String> = s
        .driver
        .calls()
        .iter()
        .filter_map(|c| match c {
            am_engine::DriverCall::ExecuteTask { title, .. } => Some(title.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(executed, vec!["first", "second", "third"]);

    let task_completed = s
        .event_types(&id)
        .iter()
        .filter(|t| **t == am_core::EventType::TaskCompleted)
        .count();
    assert_eq!(task_completed, 3);
}
