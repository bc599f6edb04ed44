// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event model: the append-only record of everything that happens to a workflow.

use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a persisted event.
    pub struct EventId("evt-");
}

/// Closed set of event types.
///
/// State-affecting types drive status changes during projection; the rest are
/// audit-only. The partition is encoded in [`EventType::is_state_affecting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // -- state-affecting --
    WorkflowStarted,
    StageStarted,
    ApprovalRequired,
    ApprovalGranted,
    ApprovalRejected,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowCancelled,

    // -- informational --
    StageCompleted,
    FileCreated,
    FileModified,
    FileDeleted,
    ReviewRequested,
    ReviewCompleted,
    RevisionRequested,
    SystemError,
    SystemWarning,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    DocumentIngestionStarted,
    DocumentIngestionProgress,
    DocumentIngestionCompleted,
    DocumentIngestionFailed,
}

crate::simple_display! {
    EventType {
        WorkflowStarted => "workflow_started",
        StageStarted => "stage_started",
        ApprovalRequired => "approval_required",
        ApprovalGranted => "approval_granted",
        ApprovalRejected => "approval_rejected",
        WorkflowCompleted => "workflow_completed",
        WorkflowFailed => "workflow_failed",
        WorkflowCancelled => "workflow_cancelled",
        StageCompleted => "stage_completed",
        FileCreated => "file_created",
        FileModified => "file_modified",
        FileDeleted => "file_deleted",
        ReviewRequested => "review_requested",
        ReviewCompleted => "review_completed",
        RevisionRequested => "revision_requested",
        SystemError => "system_error",
        SystemWarning => "system_warning",
        TaskStarted => "task_started",
        TaskCompleted => "task_completed",
        TaskFailed => "task_failed",
        DocumentIngestionStarted => "document_ingestion_started",
        DocumentIngestionProgress => "document_ingestion_progress",
        DocumentIngestionCompleted => "document_ingestion_completed",
        DocumentIngestionFailed => "document_ingestion_failed",
    }
}

impl EventType {
    /// True for event types that move the workflow status during projection.
    pub fn is_state_affecting(&self) -> bool {
        matches!(
            self,
            EventType::WorkflowStarted
                | EventType::StageStarted
                | EventType::ApprovalRequired
                | EventType::ApprovalGranted
                | EventType::ApprovalRejected
                | EventType::WorkflowCompleted
                | EventType::WorkflowFailed
                | EventType::WorkflowCancelled
        )
    }

    /// All variants, for table-driven tests and proptest strategies.
    pub const ALL: [EventType; 24] = [
        EventType::WorkflowStarted,
        EventType::StageStarted,
        EventType::ApprovalRequired,
        EventType::ApprovalGranted,
        EventType::ApprovalRejected,
        EventType::WorkflowCompleted,
        EventType::WorkflowFailed,
        EventType::WorkflowCancelled,
        EventType::StageCompleted,
        EventType::FileCreated,
        EventType::FileModified,
        EventType::FileDeleted,
        EventType::ReviewRequested,
        EventType::ReviewCompleted,
        EventType::RevisionRequested,
        EventType::SystemError,
        EventType::SystemWarning,
        EventType::TaskStarted,
        EventType::TaskCompleted,
        EventType::TaskFailed,
        EventType::DocumentIngestionStarted,
        EventType::DocumentIngestionProgress,
        EventType::DocumentIngestionCompleted,
        EventType::DocumentIngestionFailed,
    ];
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|t| t.to_string() == s)
            .copied()
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Well-known keys inside [`WorkflowEvent::data`] payloads.
pub mod data_keys {
    /// Stage name on stage_started / stage_completed.
    pub const STAGE: &str = "stage";
    /// Task index on task_started / task_completed / task_failed.
    pub const TASK: &str = "task";
    /// Approval gate name on approval_required.
    pub const GATE: &str = "gate";
    /// Reviewer feedback on approval_rejected / revision_requested.
    pub const FEEDBACK: &str = "feedback";
    /// Failure reason on workflow_failed / workflow_cancelled.
    pub const REASON: &str = "reason";
}

/// An immutable, sequenced record of something that happened to a workflow.
///
/// `(workflow_id, sequence)` is unique; sequences are dense starting at 1.
/// Events are never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: EventId,
    pub workflow_id: WorkflowId,
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// Free-form source tag ("system", "architect", "developer", ...)
    pub agent: String,
    pub event_type: EventType,
    /// Human-readable description
    pub message: String,
    /// Optional structured payload (stage names, task indices, feedback)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Links cause to effect, e.g. an approval request to its grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl WorkflowEvent {
    /// Extract a string field from the structured payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }

    /// Compact one-line summary for log spans.
    pub fn log_summary(&self) -> String {
        format!("{} wf={} seq={}", self.event_type, self.workflow_id.short(8), self.sequence)
    }
}

/// An event as composed by an emitter, before the sequence allocator assigns
/// identity, ordering, and a timestamp.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub agent: String,
    pub event_type: EventType,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub correlation_id: Option<String>,
}

impl EventDraft {
    pub fn new(event_type: EventType, agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            event_type,
            message: message.into(),
            data: None,
            correlation_id: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
