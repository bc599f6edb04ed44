// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test fixtures and proptest strategies shared with other crates' tests.

use crate::event::{EventDraft, EventId, EventType, WorkflowEvent};
use crate::status::WorkflowStatus;
use crate::workflow::WorkflowId;

/// Build a persisted event at a given sequence with fixed timestamps.
pub fn make_event(workflow_id: WorkflowId, sequence: u64, event_type: EventType) -> WorkflowEvent {
    WorkflowEvent {
        id: EventId::new(),
        workflow_id,
        sequence,
        timestamp_ms: 1_000_000 + sequence * 1_000,
        agent: "system".to_string(),
        event_type,
        message: event_type.to_string(),
        data: None,
        correlation_id: None,
    }
}

/// Build a draft of the given type with a "system" agent.
pub fn make_draft(event_type: EventType) -> EventDraft {
    EventDraft::new(event_type, "system", event_type.to_string())
}

/// The dense event log of a happy-path run: start, one stage, approval
/// round-trip, completion.
pub fn happy_path_events(workflow_id: WorkflowId) -> Vec<WorkflowEvent> {
    let mut events = vec![
        make_event(workflow_id, 1, EventType::WorkflowStarted),
        make_event(workflow_id, 2, EventType::StageStarted),
        make_event(workflow_id, 3, EventType::StageCompleted),
        make_event(workflow_id, 4, EventType::ApprovalRequired),
        make_event(workflow_id, 5, EventType::ApprovalGranted),
        make_event(workflow_id, 6, EventType::WorkflowCompleted),
    ];
    events[1].data = Some(serde_json::json!({ "stage": "planning" }));
    events[2].data = Some(serde_json::json!({ "stage": "planning" }));
    events
}

pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    pub fn event_type() -> impl Strategy<Value = EventType> {
        proptest::sample::select(EventType::ALL.to_vec())
    }

    pub fn status() -> impl Strategy<Value = WorkflowStatus> {
        proptest::sample::select(vec![
            WorkflowStatus::Pending,
            WorkflowStatus::InProgress,
            WorkflowStatus::Blocked,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
            WorkflowStatus::Cancelled,
        ])
    }

    /// A dense event log (sequence 1..=n) of arbitrary types for one workflow.
    pub fn dense_event_log(max_len: usize) -> impl Strategy<Value = Vec<WorkflowEvent>> {
        proptest::collection::vec(event_type(), 0..max_len).prop_map(|types| {
            let workflow_id = WorkflowId::from_string("wfl-proptest");
            types
                .into_iter()
                .enumerate()
                .map(|(i, t)| make_event(workflow_id, (i + 1) as u64, t))
                .collect()
        })
    }
}
