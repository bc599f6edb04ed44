// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow REST handlers.

use super::dto::*;
use super::error::ApiError;
use crate::lifecycle::AppState;
use am_core::workflow::Workflow;
use am_core::WorkflowStatus;
use am_engine::pipeline::implementation;
use am_engine::StartRequest;
use am_storage::{Cursor, WorkflowFilter};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::str::FromStr;

/// `POST /workflows`
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowDto>), ApiError> {
    let external_plan = resolve_plan(req.plan_file.as_deref(), req.plan_content).await?;

    let workflow = state.supervisor.start(StartRequest {
        issue_id: req.issue_id,
        worktree_path: req.worktree_path,
        worktree_name: req.worktree_name,
        pipeline: req.pipeline,
        driver: req.driver,
        profile: req.profile,
        external_plan,
        correlation_id: req.correlation_id,
    })?;

    Ok((StatusCode::CREATED, Json(WorkflowDto::from(&workflow))))
}

/// `GET /workflows`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<WorkflowListDto>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(WorkflowStatus::from_str)
        .transpose()
        .map_err(ApiError::invalid_request)?;
    let filter = WorkflowFilter { status, worktree: query.worktree };

    let limit = query
        .limit
        .unwrap_or(state.config.list_default_limit)
        .clamp(1, state.config.list_max_limit);
    let cursor = query.cursor.as_deref().map(Cursor::decode).transpose()?;

    let page = state.db.list_workflows(&filter, limit, cursor.as_ref())?;
    Ok(Json(WorkflowListDto {
        workflows: page.workflows.iter().map(WorkflowDto::from).collect(),
        has_more: page.has_more,
        cursor: page.cursor,
    }))
}

/// `GET /workflows/active`
pub async fn active(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowDto>>, ApiError> {
    let workflows = state.db.active_workflows()?;
    Ok(Json(workflows.iter().map(WorkflowDto::from).collect()))
}

/// `GET /workflows/{id}`
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDetailDto>, ApiError> {
    let workflow = require_workflow(&state, &id)?;
    let events = state.db.recent_events(&id, state.config.recent_events_limit)?;
    let tokens = state.db.token_totals(&id)?;

    Ok(Json(WorkflowDetailDto {
        workflow: WorkflowDto::from(&workflow),
        recent_events: events.iter().map(EventDto::from).collect(),
        tokens,
    }))
}

/// `POST /workflows/{id}/approve`
pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<StatusDto>, ApiError> {
    let Json(req) = body.unwrap_or_default();
    state.supervisor.approve(&id, req.correlation_id)?;
    Ok(Json(status_dto(&state, &id)?))
}

/// `POST /workflows/{id}/reject`
pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<StatusDto>, ApiError> {
    state.supervisor.reject(&id, req.feedback)?;
    Ok(Json(status_dto(&state, &id)?))
}

/// `POST /workflows/{id}/cancel`, idempotent.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<StatusDto>, ApiError> {
    let Json(req) = body.unwrap_or_default();
    let status = state.supervisor.cancel(&id, req.reason)?;
    Ok(Json(StatusDto { id, status: status.to_string() }))
}

/// `POST /workflows/{id}/plan`: attach an external plan before execution
/// begins. 409 when a plan already exists and `force` is not set.
pub async fn set_plan(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetPlanRequest>,
) -> Result<Json<StatusDto>, ApiError> {
    let workflow = require_workflow(&state, &id)?;

    let plan_eligible = match workflow.status {
        WorkflowStatus::Pending => true,
        WorkflowStatus::InProgress | WorkflowStatus::Blocked => matches!(
            workflow.current_stage.as_deref(),
            Some(implementation::stages::PLANNING) | Some(implementation::stages::VALIDATION)
        ),
        _ => false,
    };
    if !plan_eligible {
        return Err(ApiError::new(
            am_core::ErrorKind::InvalidState,
            format!(
                "workflow is {} at stage {:?}; a plan can only be set before execution starts",
                workflow.status, workflow.current_stage
            ),
        ));
    }

    let content = resolve_plan(req.plan_file.as_deref(), req.plan_content)
        .await?
        .ok_or_else(|| ApiError::invalid_request("one of plan_file or plan_content required"))?;

    let mut blob = state
        .db
        .workflow_state_blob(&id)?
        .unwrap_or_else(|| serde_json::json!({}));
    let mut data: implementation::ImplementationState = blob
        .get("pipeline")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ApiError::invalid_request(format!("corrupt pipeline state: {e}")))?
        .unwrap_or_default();

    if data.plan.is_some() && !req.force {
        return Err(ApiError::new(
            am_core::ErrorKind::WorkflowConflict,
            "workflow already has a plan; pass force to replace it",
        ));
    }

    data.plan = Some(implementation::plan_from_markdown(&content));
    data.external_plan = true;
    if data.max_review_iterations == 0 {
        data.max_review_iterations = state.config.max_review_iterations;
    }
    blob["pipeline"] = serde_json::to_value(&data)
        .map_err(|e| ApiError::invalid_request(format!("plan serialization: {e}")))?;

    state
        .db
        .update_workflow_state(&id, workflow.current_stage.as_deref(), &blob)?;

    Ok(Json(status_dto(&state, &id)?))
}

/// `GET /workflows/{id}/events`
pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventDto>>, ApiError> {
    require_workflow(&state, &id)?;
    let events = state.db.events_for(&id, query.since)?;
    Ok(Json(events.iter().map(EventDto::from).collect()))
}

/// `GET /workflows/{id}/tokens`
pub async fn tokens(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TokensDto>, ApiError> {
    require_workflow(&state, &id)?;
    Ok(Json(TokensDto {
        totals: state.db.token_totals(&id)?,
        usage: state.db.token_usage_rows(&id)?,
    }))
}

fn require_workflow(state: &AppState, id: &str) -> Result<Workflow, ApiError> {
    state
        .db
        .get_workflow(id)?
        .ok_or_else(|| ApiError::not_found(format!("workflow {id}")))
}

fn status_dto(state: &AppState, id: &str) -> Result<StatusDto, ApiError> {
    let workflow = require_workflow(state, id)?;
    Ok(StatusDto { id: id.to_string(), status: workflow.status.to_string() })
}

/// Enforce `plan_file` XOR `plan_content` and load the file variant.
async fn resolve_plan(
    plan_file: Option<&std::path::Path>,
    plan_content: Option<String>,
) -> Result<Option<String>, ApiError> {
    match (plan_file, plan_content) {
        (Some(_), Some(_)) => Err(ApiError::invalid_request(
            "plan_file and plan_content are mutually exclusive",
        )),
        (Some(path), None) => {
            if !path.is_absolute() {
                return Err(ApiError::invalid_request("plan_file must be an absolute path"));
            }
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                ApiError::invalid_request(format!("could not read plan_file: {e}"))
            })?;
            Ok(Some(content))
        }
        (None, Some(content)) => Ok(Some(content)),
        (None, None) => Ok(None),
    }
}
