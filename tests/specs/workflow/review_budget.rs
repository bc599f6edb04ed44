// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A task that keeps failing review burns its budget, fails the task, and
//! fails the workflow.

use crate::prelude::*;
use am_core::{EventType, WorkflowStatus};
use am_engine::SupervisorConfig;

#[tokio::test]
async fn exhausted_reviews_emit_task_failed_then_workflow_failed() {
    let s = specs_with(SupervisorConfig { max_review_iterations: 2, ..Default::default() });
    for _ in 0..2 {
        s.driver.review_changes_requested("still broken");
    }

    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Failed).await;

    let types = s.event_types(&id);
    let task_failed = types.iter().position(|t| *t == EventType::TaskFailed).unwrap();
    let workflow_failed =
        types.iter().position(|t| *t == EventType::WorkflowFailed).unwrap();
    assert!(task_failed < workflow_failed);

    let wf = s.db.get_workflow(&id).unwrap().unwrap();
    assert!(wf.failure_reason.unwrap().contains("review iterations"));
}

#[tokio::test]
async fn one_revision_within_budget_still_completes() {
    let s = specs_with(SupervisorConfig { max_review_iterations: 3, ..Default::default() });
    s.driver.review_changes_requested("tighten edge cases");

    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let types = s.event_types(&id);
    assert!(types.contains(&EventType::RevisionRequested));
    assert!(types.contains(&EventType::TaskCompleted));
    assert!(!types.contains(&EventType::TaskFailed));
}

#[tokio::test]
async fn fatal_driver_error_fails_the_workflow() {
    let s = specs();
    s.driver
        .push_task(Err(am_engine::DriverError::Fatal("model refused".to_string())));

    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Failed).await;

    let wf = s.db.get_workflow(&id).unwrap().unwrap();
    assert!(wf.failure_reason.unwrap().contains("model refused"));
}

#[tokio::test]
async fn transient_driver_errors_are_retried() {
    let s = specs();
    s.driver
        .push_task(Err(am_engine::DriverError::Transient("rate limited".to_string())));

    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    // The retry succeeds (queue exhausted → noop behaviour)
    s.wait_status(&id, WorkflowStatus::Completed).await;
}
