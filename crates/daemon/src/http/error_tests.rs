// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use am_core::workflow::WorkflowId;
use am_core::WorkflowStatus;

#[yare::parameterized(
    conflict    = { ErrorKind::WorkflowConflict, StatusCode::CONFLICT },
    concurrency = { ErrorKind::ConcurrencyLimit, StatusCode::TOO_MANY_REQUESTS },
    not_found   = { ErrorKind::NotFound, StatusCode::NOT_FOUND },
    state       = { ErrorKind::InvalidState, StatusCode::UNPROCESSABLE_ENTITY },
    request     = { ErrorKind::InvalidRequest, StatusCode::BAD_REQUEST },
    draining    = { ErrorKind::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE },
    rate        = { ErrorKind::RateLimited, StatusCode::TOO_MANY_REQUESTS },
    internal    = { ErrorKind::InternalError, StatusCode::INTERNAL_SERVER_ERROR },
)]
fn kinds_map_to_documented_statuses(kind: ErrorKind, status: StatusCode) {
    assert_eq!(ApiError::new(kind, "boom").status, status);
}

#[test]
fn conflict_carries_existing_workflow_details() {
    let api = ApiError::from(EngineError::WorkflowConflict {
        worktree_path: "/w/a".into(),
        existing_id: WorkflowId::from_string("wfl-1"),
        existing_status: WorkflowStatus::Blocked,
    });
    assert_eq!(api.status, StatusCode::CONFLICT);
    assert_eq!(api.code, "WORKFLOW_CONFLICT");
    let details = api.details.unwrap();
    assert_eq!(details["existing_workflow_id"], "wfl-1");
    assert_eq!(details["existing_status"], "blocked");
}

#[test]
fn concurrency_limit_sets_retry_after() {
    let api = ApiError::from(EngineError::ConcurrencyLimit {
        active: 3,
        limit: 3,
        retry_after_secs: 30,
    });
    assert_eq!(api.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(api.retry_after_secs, Some(30));

    let response = api.into_response();
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
}

#[test]
fn no_pending_gate_is_unprocessable() {
    let api = ApiError::from(EngineError::NoPendingGate("wfl-1".to_string()));
    assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(api.code, "INVALID_STATE");
}

#[test]
fn storage_not_found_maps_through() {
    let api = ApiError::from(StorageError::WorkflowNotFound("wfl-9".to_string()));
    assert_eq!(api.status, StatusCode::NOT_FOUND);
    assert_eq!(api.code, "NOT_FOUND");
}
