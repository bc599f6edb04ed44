// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boundary error mapping: engine/store error kinds → HTTP responses with
//! machine-readable codes.

use am_core::ErrorKind;
use am_engine::EngineError;
use am_storage::StorageError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// An error ready to leave the process.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            code: kind.code(),
            message: message.into(),
            details: None,
            retry_after_secs: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{what} not found"))
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn shutting_down() -> Self {
        Self::new(ErrorKind::ShuttingDown, "server is shutting down")
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::WorkflowConflict => StatusCode::CONFLICT,
        ErrorKind::ConcurrencyLimit | ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let mut api = ApiError::new(e.kind(), e.to_string());
        match &e {
            EngineError::WorkflowConflict { worktree_path, existing_id, existing_status } => {
                api.details = Some(json!({
                    "worktree_path": worktree_path,
                    "existing_workflow_id": existing_id,
                    "existing_status": existing_status,
                }));
            }
            EngineError::ConcurrencyLimit { active, limit, retry_after_secs } => {
                api.details = Some(json!({ "active": active, "limit": limit }));
                api.retry_after_secs = Some(*retry_after_secs);
            }
            _ => {}
        }
        api
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::new(e.kind(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let body = Json(json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            }
        }));
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
