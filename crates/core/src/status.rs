// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow status and the legal transitions between statuses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current status of a workflow.
///
/// `Completed`, `Failed`, and `Cancelled` are terminal: once reached, no
/// further transition is accepted anywhere in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created, executor not yet running
    Pending,
    /// Executor is running pipeline stages
    InProgress,
    /// Parked at an approval gate
    Blocked,
    /// All stages finished
    Completed,
    /// Stage error, rejection, or invariant violation
    Failed,
    /// Cancelled by a client, the health monitor, or shutdown
    Cancelled,
}

crate::simple_display! {
    WorkflowStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Blocked => "blocked",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Attempted a status transition the table does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition: {from} -> {to}")]
pub struct InvalidStateTransition {
    pub from: WorkflowStatus,
    pub to: WorkflowStatus,
}

impl WorkflowStatus {
    /// Statuses that count against the per-worktree and global limits.
    pub const ACTIVE: [WorkflowStatus; 3] =
        [WorkflowStatus::Pending, WorkflowStatus::InProgress, WorkflowStatus::Blocked];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::InProgress => "in_progress",
            WorkflowStatus::Blocked => "blocked",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Check that `from -> to` is a legal transition.
    ///
    /// Every status write in the system goes through this table; there is no
    /// raw-write path. Self-transitions are rejected along with everything
    /// else not explicitly listed.
    pub fn validate_transition(
        from: WorkflowStatus,
        to: WorkflowStatus,
    ) -> Result<(), InvalidStateTransition> {
        use WorkflowStatus::*;
        let ok = matches!(
            (from, to),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Blocked)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Blocked, InProgress)
                | (Blocked, Failed)
                | (Blocked, Cancelled)
        );
        if ok {
            Ok(())
        } else {
            Err(InvalidStateTransition { from, to })
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkflowStatus::Pending),
            "in_progress" => Ok(WorkflowStatus::InProgress),
            "blocked" => Ok(WorkflowStatus::Blocked),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "cancelled" => Ok(WorkflowStatus::Cancelled),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
