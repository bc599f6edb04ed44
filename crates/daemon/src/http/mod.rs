// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST surface wiring.

pub mod dto;
pub mod error;
pub mod health;
pub mod workflows;

use crate::lifecycle::AppState;
use crate::ws;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::Ordering;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/workflows", post(workflows::create).get(workflows::list))
        .route("/workflows/active", get(workflows::active))
        .route("/workflows/{id}", get(workflows::detail))
        .route("/workflows/{id}/approve", post(workflows::approve))
        .route("/workflows/{id}/reject", post(workflows::reject))
        .route("/workflows/{id}/cancel", post(workflows::cancel))
        .route("/workflows/{id}/plan", post(workflows::set_plan))
        .route("/workflows/{id}/events", get(workflows::events))
        .route("/workflows/{id}/tokens", get(workflows::tokens))
        .route("/ws/events", get(ws::ws_events))
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .layer(middleware::from_fn_with_state(state.clone(), drain_guard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// While draining, refuse to take on new workflows; everything else (status
/// queries, approve/cancel on parked workflows) keeps working.
async fn drain_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, error::ApiError> {
    if state.shutting_down.load(Ordering::SeqCst)
        && request.method() == Method::POST
        && request.uri().path() == "/workflows"
    {
        return Err(error::ApiError::shutting_down());
    }
    Ok(next.run(request).await)
}
