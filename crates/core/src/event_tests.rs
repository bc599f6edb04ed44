// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::make_event;
use proptest::prelude::*;

// --- state-affecting partition ---

#[test]
fn exactly_eight_types_are_state_affecting() {
    let affecting: Vec<_> =
        EventType::ALL.iter().filter(|t| t.is_state_affecting()).collect();
    assert_eq!(affecting.len(), 8);
}

#[yare::parameterized(
    started   = { EventType::WorkflowStarted },
    stage     = { EventType::StageStarted },
    required  = { EventType::ApprovalRequired },
    granted   = { EventType::ApprovalGranted },
    rejected  = { EventType::ApprovalRejected },
    completed = { EventType::WorkflowCompleted },
    failed    = { EventType::WorkflowFailed },
    cancelled = { EventType::WorkflowCancelled },
)]
fn state_affecting_types(event_type: EventType) {
    assert!(event_type.is_state_affecting());
}

#[yare::parameterized(
    stage_done = { EventType::StageCompleted },
    file       = { EventType::FileModified },
    review     = { EventType::ReviewCompleted },
    task       = { EventType::TaskFailed },
    ingestion  = { EventType::DocumentIngestionProgress },
    warning    = { EventType::SystemWarning },
)]
fn informational_types(event_type: EventType) {
    assert!(!event_type.is_state_affecting());
}

// --- serde ---

#[test]
fn event_type_uses_snake_case_wire_names() {
    let json = serde_json::to_string(&EventType::ApprovalRequired).unwrap();
    assert_eq!(json, "\"approval_required\"");
}

#[test]
fn event_roundtrips_with_data_and_correlation() {
    let mut event = make_event(WorkflowId::from_string("wfl-1"), 3, EventType::StageStarted);
    event.data = Some(serde_json::json!({ "stage": "planning", "attempt": 2 }));
    event.correlation_id = Some("corr-9".to_string());

    let json = serde_json::to_string(&event).unwrap();
    let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn absent_optionals_are_omitted_from_wire() {
    let event = make_event(WorkflowId::from_string("wfl-1"), 1, EventType::WorkflowStarted);
    let json = serde_json::to_string(&event).unwrap();
    assert!(!json.contains("\"data\""));
    assert!(!json.contains("\"correlation_id\""));
}

#[test]
fn data_str_reads_payload_fields() {
    let mut event = make_event(WorkflowId::from_string("wfl-1"), 1, EventType::StageStarted);
    event.data = Some(serde_json::json!({ "stage": "review" }));
    assert_eq!(event.data_str(data_keys::STAGE), Some("review"));
    assert_eq!(event.data_str("missing"), None);
}

// --- drafts ---

#[test]
fn draft_builders_set_optionals() {
    let draft = EventDraft::new(EventType::SystemWarning, "system", "careful")
        .with_data(serde_json::json!({ "detail": 1 }))
        .with_correlation(Some("corr-1".into()));
    assert_eq!(draft.agent, "system");
    assert!(draft.data.is_some());
    assert_eq!(draft.correlation_id.as_deref(), Some("corr-1"));
}

// --- properties ---

proptest! {
    /// Every event type serialises to a string that parses back to itself.
    #[test]
    fn event_type_roundtrip(t in crate::test_support::strategies::event_type()) {
        let json = serde_json::to_string(&t).unwrap();
        let parsed: EventType = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, t);
        prop_assert_eq!(t.to_string().parse::<EventType>().unwrap(), t);
    }
}
