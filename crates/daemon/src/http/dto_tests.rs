// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use am_core::test_support::make_event;
use am_core::workflow::WorkflowId;
use am_core::{EventType, WorkflowStatus};

#[test]
fn rfc3339_renders_utc_millis() {
    assert_eq!(rfc3339(0), "1970-01-01T00:00:00.000Z");
    assert_eq!(rfc3339(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
}

#[test]
fn workflow_dto_converts_timestamps_and_skips_absent_fields() {
    let wf = Workflow::builder()
        .id(WorkflowId::from_string("wfl-1"))
        .status(WorkflowStatus::InProgress)
        .started_at_ms(1_700_000_000_000u64)
        .current_stage("planning")
        .build();

    let dto = WorkflowDto::from(&wf);
    assert_eq!(dto.id, "wfl-1");
    assert_eq!(dto.status, "in_progress");
    assert_eq!(dto.started_at.as_deref(), Some("2023-11-14T22:13:20.000Z"));

    let json = serde_json::to_string(&dto).unwrap();
    assert!(!json.contains("completed_at"));
    assert!(!json.contains("failure_reason"));
    assert!(json.contains(r#""current_stage":"planning""#));
}

#[test]
fn event_dto_preserves_payload_and_correlation() {
    let mut event = make_event(WorkflowId::from_string("wfl-1"), 2, EventType::StageStarted);
    event.data = Some(serde_json::json!({ "stage": "review" }));
    event.correlation_id = Some("corr-7".to_string());

    let dto = EventDto::from(&event);
    assert_eq!(dto.sequence, 2);
    assert_eq!(dto.event_type, "stage_started");
    assert_eq!(dto.data.as_ref().unwrap()["stage"], "review");
    assert_eq!(dto.correlation_id.as_deref(), Some("corr-7"));
}

#[test]
fn detail_dto_flattens_the_workflow() {
    let wf = Workflow::builder().id(WorkflowId::from_string("wfl-1")).build();
    let detail = WorkflowDetailDto {
        workflow: WorkflowDto::from(&wf),
        recent_events: vec![],
        tokens: TokenTotals::default(),
    };
    let json: serde_json::Value = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["id"], "wfl-1");
    assert!(json["tokens"]["cost_usd"].is_number());
}

#[test]
fn approve_request_body_is_optional_shaped() {
    let parsed: ApproveRequest = serde_json::from_str("{}").unwrap();
    assert!(parsed.correlation_id.is_none());

    let parsed: ApproveRequest =
        serde_json::from_str(r#"{"correlation_id":"corr-1"}"#).unwrap();
    assert_eq!(parsed.correlation_id.as_deref(), Some("corr-1"));
}

#[test]
fn set_plan_request_defaults_force_off() {
    let parsed: SetPlanRequest =
        serde_json::from_str(r#"{"plan_content":"- do it"}"#).unwrap();
    assert!(!parsed.force);
    assert_eq!(parsed.plan_content.as_deref(), Some("- do it"));
}
