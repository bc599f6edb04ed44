// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine-readable error kinds shared across the boundary.
//!
//! Every crate keeps its own `thiserror` sum type; this enum is the common
//! classification the transport layer maps to status codes and that clients
//! can branch on without parsing messages.

use serde::{Deserialize, Serialize};

/// Error classification surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The worktree already has an active workflow
    WorkflowConflict,
    /// The global concurrency cap is reached
    ConcurrencyLimit,
    NotFound,
    /// Illegal status transition, or approve/reject with no pending gate
    InvalidState,
    /// Bad input: unsafe path, malformed issue id, invalid body
    InvalidRequest,
    /// Server is draining; new workflows refused
    ShuttingDown,
    RateLimited,
    InternalError,
}

crate::simple_display! {
    ErrorKind {
        WorkflowConflict => "WORKFLOW_CONFLICT",
        ConcurrencyLimit => "CONCURRENCY_LIMIT",
        NotFound => "NOT_FOUND",
        InvalidState => "INVALID_STATE",
        InvalidRequest => "INVALID_REQUEST",
        ShuttingDown => "SHUTTING_DOWN",
        RateLimited => "RATE_LIMITED",
        InternalError => "INTERNAL_ERROR",
    }
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::WorkflowConflict => "WORKFLOW_CONFLICT",
            ErrorKind::ConcurrencyLimit => "CONCURRENCY_LIMIT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::ShuttingDown => "SHUTTING_DOWN",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }
}
