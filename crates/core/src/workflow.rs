// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow record and input validation.

use crate::status::WorkflowStatus;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a workflow instance.
    ///
    /// One workflow is one execution of a pipeline against one worktree for
    /// one issue, from creation through a terminal status.
    pub struct WorkflowId("wfl-");
}

/// Maximum length of a user-supplied issue id.
pub const ISSUE_ID_MAX_LEN: usize = 100;

/// A stage the workflow has entered, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageVisit {
    pub stage: String,
    pub entered_at_ms: u64,
}

/// The current state of a workflow.
///
/// The status column is a cache; the event log is the source of truth and
/// [`crate::projection::project`] rebuilds this record from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    /// User-supplied issue handle (alphanumeric/dash/underscore, ≤ 100 chars)
    pub issue_id: String,
    /// Absolute, canonicalised root of the git worktree
    pub worktree_path: PathBuf,
    /// Display name (usually the branch)
    pub worktree_name: String,
    /// Registered pipeline name
    pub pipeline: String,
    pub status: WorkflowStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    /// Set exactly when the status is terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Stage history, persisted inside the state blob
    #[serde(default)]
    pub stages: Vec<StageVisit>,
}

impl Workflow {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

crate::builder! {
    pub struct WorkflowBuilder => Workflow {
        into {
            issue_id: String = "ISSUE-1",
            worktree_name: String = "main",
            pipeline: String = "implementation",
        }
        set {
            id: WorkflowId = WorkflowId::new(),
            worktree_path: PathBuf = PathBuf::from("/w/a"),
            status: WorkflowStatus = WorkflowStatus::Pending,
            created_at_ms: u64 = 1_000_000,
        }
        option {
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            current_stage: String = None,
            failure_reason: String = None,
        }
        computed {
            stages: Vec<StageVisit> = Vec::new(),
        }
    }
}

/// Rejected workflow input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("issue id must be 1-{ISSUE_ID_MAX_LEN} alphanumeric/dash/underscore characters: {0:?}")]
    BadIssueId(String),
    #[error("worktree path must be absolute: {0}")]
    RelativePath(PathBuf),
    #[error("worktree path contains a NUL byte")]
    NulInPath,
}

/// Validate a user-supplied issue handle.
pub fn validate_issue_id(issue_id: &str) -> Result<(), ValidationError> {
    let ok = !issue_id.is_empty()
        && issue_id.len() <= ISSUE_ID_MAX_LEN
        && issue_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::BadIssueId(issue_id.to_string()))
    }
}

/// Validate a worktree path shape (I1). Existence and the `.git` marker are
/// checked by the supervisor, which owns filesystem access.
pub fn validate_worktree_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(ValidationError::NulInPath);
    }
    if !path.is_absolute() {
        return Err(ValidationError::RelativePath(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
