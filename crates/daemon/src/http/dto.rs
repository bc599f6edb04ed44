// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire DTOs for the REST surface.
//!
//! Timestamps leave the process as RFC 3339 strings; internally everything
//! is epoch milliseconds.

use am_core::event::WorkflowEvent;
use am_core::tokens::TokenTotals;
use am_core::workflow::Workflow;
use am_storage::TokenUsageRow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub fn rfc3339(ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

// --- responses ---

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDto {
    pub id: String,
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: String,
    pub pipeline: String,
    pub status: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&Workflow> for WorkflowDto {
    fn from(wf: &Workflow) -> Self {
        Self {
            id: wf.id.to_string(),
            issue_id: wf.issue_id.clone(),
            worktree_path: wf.worktree_path.clone(),
            worktree_name: wf.worktree_name.clone(),
            pipeline: wf.pipeline.clone(),
            status: wf.status.to_string(),
            created_at: rfc3339(wf.created_at_ms),
            started_at: wf.started_at_ms.map(rfc3339),
            completed_at: wf.completed_at_ms.map(rfc3339),
            current_stage: wf.current_stage.clone(),
            failure_reason: wf.failure_reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDto {
    pub id: String,
    pub workflow_id: String,
    pub sequence: u64,
    pub timestamp: String,
    pub agent: String,
    pub event_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl From<&WorkflowEvent> for EventDto {
    fn from(event: &WorkflowEvent) -> Self {
        Self {
            id: event.id.to_string(),
            workflow_id: event.workflow_id.to_string(),
            sequence: event.sequence,
            timestamp: rfc3339(event.timestamp_ms),
            agent: event.agent.clone(),
            event_type: event.event_type.to_string(),
            message: event.message.clone(),
            data: event.data.clone(),
            correlation_id: event.correlation_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkflowDetailDto {
    #[serde(flatten)]
    pub workflow: WorkflowDto,
    pub recent_events: Vec<EventDto>,
    pub tokens: TokenTotals,
}

#[derive(Debug, Serialize)]
pub struct WorkflowListDto {
    pub workflows: Vec<WorkflowDto>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokensDto {
    pub totals: TokenTotals,
    pub usage: Vec<TokenUsageRow>,
}

#[derive(Debug, Serialize)]
pub struct StatusDto {
    pub id: String,
    pub status: String,
}

// --- requests ---

#[derive(Debug, Deserialize)]
pub struct CreateWorkflowRequest {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: Option<String>,
    pub pipeline: Option<String>,
    pub profile: Option<String>,
    pub driver: Option<String>,
    /// Path to a plan file on this host. Mutually exclusive with
    /// `plan_content`.
    pub plan_file: Option<PathBuf>,
    pub plan_content: Option<String>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub correlation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub feedback: String,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPlanRequest {
    pub plan_file: Option<PathBuf>,
    pub plan_content: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub worktree: Option<PathBuf>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only events with a sequence greater than this
    pub since: Option<u64>,
}

#[cfg(test)]
#[path = "dto_tests.rs"]
mod tests;
