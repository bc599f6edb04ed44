// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health endpoints: liveness, readiness, and a full status report with
//! database read/write probes.

use crate::env::SERVER_VERSION;
use crate::lifecycle::AppState;
use am_core::Clock;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::atomic::Ordering;

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub active_workflows: usize,
    pub websocket_connections: usize,
    pub database: DatabaseHealthDto,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealthDto {
    pub readable: bool,
    pub writable: bool,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthDto>) {
    let readable = state.db.read_probe().is_ok();
    let writable = state.db.write_probe(state.clock.epoch_ms()).is_ok();

    let active_workflows = state.db.active_count().unwrap_or(0);
    let healthy = readable && writable;

    let dto = HealthDto {
        status: if healthy { "ok" } else { "degraded" },
        version: SERVER_VERSION,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_workflows,
        websocket_connections: state.connections.connection_count(),
        database: DatabaseHealthDto { readable, writable },
    };

    let status =
        if healthy { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(dto))
}

/// `GET /health/live`: the process is up.
pub async fn live() -> &'static str {
    "ok"
}

/// `GET /health/ready`: startup recovery finished and we are not draining.
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    if state.ready.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
