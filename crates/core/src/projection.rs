// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projection: fold the event log into a workflow record.
//!
//! Projection is the pure counterpart of the status cache. It must be
//! deterministic and idempotent: events that would produce an illegal status
//! transition (e.g. a replayed duplicate) are skipped rather than applied,
//! so replaying a prefix twice yields the same record.

use crate::event::{data_keys, EventType, WorkflowEvent};
use crate::status::WorkflowStatus;
use crate::workflow::{StageVisit, Workflow};

/// Rebuild a workflow record from its events.
///
/// Events must be the dense, sequence-sorted log for a single workflow
/// (`sequence` 1..N). Returns `None` for an empty slice. Informational and
/// unknown payloads are no-ops; only the state-affecting types move the
/// record, per the transition table.
pub fn project(events: &[WorkflowEvent]) -> Option<Workflow> {
    let first = events.first()?;

    let mut wf = Workflow {
        id: first.workflow_id,
        issue_id: String::new(),
        worktree_path: std::path::PathBuf::new(),
        worktree_name: String::new(),
        pipeline: String::new(),
        status: WorkflowStatus::Pending,
        created_at_ms: first.timestamp_ms,
        started_at_ms: None,
        completed_at_ms: None,
        current_stage: None,
        failure_reason: None,
        stages: Vec::new(),
    };

    for event in events {
        debug_assert_eq!(event.workflow_id, first.workflow_id);
        apply(&mut wf, event);
    }

    Some(wf)
}

/// Move the status, skipping transitions the table rejects.
fn transition(wf: &mut Workflow, to: WorkflowStatus, at_ms: u64) {
    if WorkflowStatus::validate_transition(wf.status, to).is_ok() {
        wf.status = to;
        if to.is_terminal() {
            wf.completed_at_ms = Some(at_ms);
        }
    }
}

fn apply(wf: &mut Workflow, event: &WorkflowEvent) {
    match event.event_type {
        EventType::WorkflowStarted => {
            // The start event carries the workflow's identity fields so the
            // log alone can reproduce the record.
            if let Some(data) = &event.data {
                if let Some(issue) = data.get("issue_id").and_then(|v| v.as_str()) {
                    wf.issue_id = issue.to_string();
                }
                if let Some(path) = data.get("worktree_path").and_then(|v| v.as_str()) {
                    wf.worktree_path = std::path::PathBuf::from(path);
                }
                if let Some(name) = data.get("worktree_name").and_then(|v| v.as_str()) {
                    wf.worktree_name = name.to_string();
                }
                if let Some(pipeline) = data.get("pipeline").and_then(|v| v.as_str()) {
                    wf.pipeline = pipeline.to_string();
                }
            }
            if wf.started_at_ms.is_none() {
                wf.started_at_ms = Some(event.timestamp_ms);
            }
            transition(wf, WorkflowStatus::InProgress, event.timestamp_ms);
        }

        EventType::StageStarted => {
            if let Some(stage) = event.data_str(data_keys::STAGE) {
                wf.current_stage = Some(stage.to_string());
                let already = wf
                    .stages
                    .last()
                    .is_some_and(|v| v.stage == stage && v.entered_at_ms == event.timestamp_ms);
                if !already {
                    wf.stages.push(StageVisit {
                        stage: stage.to_string(),
                        entered_at_ms: event.timestamp_ms,
                    });
                }
            }
        }

        EventType::ApprovalRequired => {
            transition(wf, WorkflowStatus::Blocked, event.timestamp_ms);
        }

        EventType::ApprovalGranted => {
            transition(wf, WorkflowStatus::InProgress, event.timestamp_ms);
        }

        EventType::ApprovalRejected => {
            if wf.failure_reason.is_none() {
                wf.failure_reason = Some(
                    event
                        .data_str(data_keys::FEEDBACK)
                        .unwrap_or(&event.message)
                        .to_string(),
                );
            }
            transition(wf, WorkflowStatus::Failed, event.timestamp_ms);
        }

        EventType::WorkflowCompleted => {
            wf.current_stage = None;
            transition(wf, WorkflowStatus::Completed, event.timestamp_ms);
        }

        EventType::WorkflowFailed => {
            if wf.failure_reason.is_none() {
                wf.failure_reason = Some(
                    event.data_str(data_keys::REASON).unwrap_or(&event.message).to_string(),
                );
            }
            transition(wf, WorkflowStatus::Failed, event.timestamp_ms);
        }

        EventType::WorkflowCancelled => {
            if wf.failure_reason.is_none() {
                if let Some(reason) = event.data_str(data_keys::REASON) {
                    wf.failure_reason = Some(reason.to_string());
                }
            }
            transition(wf, WorkflowStatus::Cancelled, event.timestamp_ms);
        }

        // Informational types carry no projection effect.
        EventType::StageCompleted
        | EventType::FileCreated
        | EventType::FileModified
        | EventType::FileDeleted
        | EventType::ReviewRequested
        | EventType::ReviewCompleted
        | EventType::RevisionRequested
        | EventType::SystemError
        | EventType::SystemWarning
        | EventType::TaskStarted
        | EventType::TaskCompleted
        | EventType::TaskFailed
        | EventType::DocumentIngestionStarted
        | EventType::DocumentIngestionProgress
        | EventType::DocumentIngestionCompleted
        | EventType::DocumentIngestionFailed => {}
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
