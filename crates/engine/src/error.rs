// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use am_core::workflow::{ValidationError, WorkflowId};
use am_core::{ErrorKind, WorkflowStatus};
use am_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the supervisor, runner, gates, and emitter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("worktree is not usable: {path}: {reason}")]
    InvalidWorktree { path: PathBuf, reason: String },

    #[error("worktree {worktree_path} already has active workflow {existing_id} ({existing_status})")]
    WorkflowConflict {
        worktree_path: PathBuf,
        existing_id: WorkflowId,
        existing_status: WorkflowStatus,
    },

    #[error("concurrency limit reached: {active} of {limit} executors busy")]
    ConcurrencyLimit { active: usize, limit: usize, retry_after_secs: u64 },

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("no pending approval gate for workflow {0}")]
    NoPendingGate(String),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error(transparent)]
    Driver(#[from] crate::driver::DriverError),

    /// A task burned through its review budget; the runner fails the workflow.
    #[error("task {task:?} exhausted {iterations} review iterations")]
    ReviewBudgetExhausted { task: String, iterations: u32 },

    #[error("pipeline state error: {0}")]
    State(#[from] serde_json::Error),

    #[error("server is shutting down")]
    ShuttingDown,
}

impl EngineError {
    /// Classification for the transport boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Storage(e) => e.kind(),
            EngineError::Validation(_) | EngineError::InvalidWorktree { .. } => {
                ErrorKind::InvalidRequest
            }
            EngineError::WorkflowConflict { .. } => ErrorKind::WorkflowConflict,
            EngineError::ConcurrencyLimit { .. } => ErrorKind::ConcurrencyLimit,
            EngineError::WorkflowNotFound(_) => ErrorKind::NotFound,
            EngineError::NoPendingGate(_) => ErrorKind::InvalidState,
            EngineError::UnknownPipeline(_) | EngineError::UnknownDriver(_) => {
                ErrorKind::InvalidRequest
            }
            EngineError::ShuttingDown => ErrorKind::ShuttingDown,
            EngineError::Driver(_)
            | EngineError::ReviewBudgetExhausted { .. }
            | EngineError::State(_) => ErrorKind::InternalError,
        }
    }
}
