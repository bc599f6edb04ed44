// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exactly one of {approve, reject, cancel} wins a gate; losers see
//! "no pending gate" and nothing is mutated twice.

use crate::prelude::*;
use am_core::{EventType, WorkflowStatus};
use am_engine::EngineError;

#[tokio::test]
async fn concurrent_approve_and_reject_have_one_winner() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;

    let approve = {
        let supervisor = s.supervisor.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || supervisor.approve(&id, None))
    };
    let reject = {
        let supervisor = s.supervisor.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || supervisor.reject(&id, "denied".to_string()))
    };

    let approve = approve.await.unwrap();
    let reject = reject.await.unwrap();
    assert_ne!(approve.is_ok(), reject.is_ok(), "exactly one resolution must win");
    let approve_won = approve.is_ok();
    let loser = if approve_won { reject } else { approve };
    assert!(matches!(loser.unwrap_err(), EngineError::NoPendingGate(_)));

    // The terminal state matches the winner
    if approve_won {
        s.wait_status(&id, WorkflowStatus::Completed).await;
    } else {
        s.wait_status(&id, WorkflowStatus::Failed).await;
        let wf = s.db.get_workflow(&id).unwrap().unwrap();
        assert_eq!(wf.failure_reason.as_deref(), Some("denied"));
    }

    // Only one of the two resolution events exists in the log
    let types = s.event_types(&id);
    let grants = types.iter().filter(|t| **t == EventType::ApprovalGranted).count();
    let rejections = types.iter().filter(|t| **t == EventType::ApprovalRejected).count();
    assert_eq!(grants + rejections, 1);
}

#[tokio::test]
async fn reject_without_a_gate_is_a_pure_no_op() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.approve(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Completed).await;

    let events_before = s.sequences(&id).len();
    let err = s.supervisor.reject(&id, "too late".to_string()).unwrap_err();
    assert!(matches!(err, EngineError::NoPendingGate(_)));

    // No mutation: same events, same status, same reason
    assert_eq!(s.sequences(&id).len(), events_before);
    let wf = s.db.get_workflow(&id).unwrap().unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);
    assert!(wf.failure_reason.is_none());
}

#[tokio::test]
async fn rejection_terminates_with_the_feedback_on_the_event() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;

    s.supervisor.reject(&id, "needs a migration plan".to_string()).unwrap();
    s.wait_status(&id, WorkflowStatus::Failed).await;

    let rejection = s
        .db
        .events_for(&id, None)
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == EventType::ApprovalRejected)
        .unwrap();
    assert_eq!(rejection.data_str("feedback"), Some("needs a migration plan"));
}

#[tokio::test]
async fn terminal_workflows_accept_no_further_state_events() {
    let s = specs();
    let id = s.start_blocked("ISSUE-1", "a").await;
    s.supervisor.cancel(&id, None).unwrap();
    s.wait_status(&id, WorkflowStatus::Cancelled).await;

    let err = s
        .emitter
        .emit(
            am_core::workflow::WorkflowId::from_string(&id),
            am_core::test_support::make_draft(am_core::EventType::WorkflowCompleted),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
}
