// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval gate rendezvous.
//!
//! A workflow parking at a gate registers a one-shot rendezvous keyed by its
//! id. Exactly one of {approve, reject, cancel} wins: resolvers pop the
//! sender and emit under a single registry-wide mutex, so a browser and a
//! CLI racing each other see one success and one "no pending gate". The
//! waiter itself wakes lock-free on the oneshot.

use crate::emit::EventEmitter;
use crate::error::EngineError;
use am_core::event::{data_keys, EventDraft, EventType};
use am_core::workflow::WorkflowId;
use am_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a pending gate was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResolution {
    Approved { correlation_id: Option<String> },
    Rejected { feedback: String },
    Cancelled,
}

/// Registry of pending gates, one at most per workflow.
pub struct ApprovalGates<C: Clock> {
    emitter: Arc<EventEmitter<C>>,
    pending: Mutex<HashMap<WorkflowId, oneshot::Sender<GateResolution>>>,
}

impl<C: Clock> ApprovalGates<C> {
    pub fn new(emitter: Arc<EventEmitter<C>>) -> Self {
        Self { emitter, pending: Mutex::new(HashMap::new()) }
    }

    /// Park the calling executor at a named gate until a client resolves it
    /// or the cancellation token fires.
    ///
    /// Registers the rendezvous, emits `approval_required`, then waits. On
    /// cancellation the gate is withdrawn so a late resolver sees "no
    /// pending gate".
    pub async fn wait(
        &self,
        workflow_id: WorkflowId,
        gate: &str,
        correlation_id: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<GateResolution, EngineError> {
        let rx = {
            let (tx, rx) = oneshot::channel();
            let mut pending = self.pending.lock();
            if pending.insert(workflow_id, tx).is_some() {
                // A stale rendezvous can only mean the previous waiter died
                // without cleanup; the replacement supersedes it.
                warn!(workflow_id = %workflow_id, "replacing stale approval gate");
            }
            rx
        };

        let emitted = self.emitter.emit(
            workflow_id,
            EventDraft::new(
                EventType::ApprovalRequired,
                "system",
                format!("Approval required at gate '{gate}'"),
            )
            .with_data(serde_json::json!({ data_keys::GATE: gate }))
            .with_correlation(correlation_id),
        );
        if let Err(e) = emitted {
            self.pending.lock().remove(&workflow_id);
            return Err(e);
        }

        info!(workflow_id = %workflow_id, gate, "workflow parked at approval gate");

        tokio::select! {
            resolution = rx => match resolution {
                Ok(resolution) => Ok(resolution),
                // Sender dropped without resolving (shutdown teardown)
                Err(_) => Ok(GateResolution::Cancelled),
            },
            _ = cancel.cancelled() => {
                self.pending.lock().remove(&workflow_id);
                Ok(GateResolution::Cancelled)
            }
        }
    }

    /// Approve the pending gate. Emits `approval_granted` and wakes the
    /// waiter; returns `NoPendingGate` if nothing is parked.
    pub fn resolve_approve(
        &self,
        workflow_id: WorkflowId,
        correlation_id: Option<String>,
    ) -> Result<(), EngineError> {
        let mut pending = self.pending.lock();
        let tx = pending
            .remove(&workflow_id)
            .ok_or_else(|| EngineError::NoPendingGate(workflow_id.to_string()))?;

        self.emitter.emit(
            workflow_id,
            EventDraft::new(EventType::ApprovalGranted, "user", "Plan approved")
                .with_correlation(correlation_id.clone()),
        )?;
        drop(pending);

        let _ = tx.send(GateResolution::Approved { correlation_id });
        Ok(())
    }

    /// Reject the pending gate with feedback. Emits `approval_rejected`
    /// (terminal failed) and wakes the waiter.
    pub fn resolve_reject(
        &self,
        workflow_id: WorkflowId,
        feedback: String,
        correlation_id: Option<String>,
    ) -> Result<(), EngineError> {
        let mut pending = self.pending.lock();
        let tx = pending
            .remove(&workflow_id)
            .ok_or_else(|| EngineError::NoPendingGate(workflow_id.to_string()))?;

        self.emitter.emit(
            workflow_id,
            EventDraft::new(EventType::ApprovalRejected, "user", "Plan rejected")
                .with_data(serde_json::json!({ data_keys::FEEDBACK: feedback.clone() }))
                .with_correlation(correlation_id),
        )?;
        drop(pending);

        let _ = tx.send(GateResolution::Rejected { feedback });
        Ok(())
    }

    /// Wake a waiter with `Cancelled` without emitting (the executor emits
    /// `workflow_cancelled` as part of its own teardown). No-op when no gate
    /// is pending.
    pub fn resolve_cancelled(&self, workflow_id: &WorkflowId) {
        if let Some(tx) = self.pending.lock().remove(workflow_id) {
            let _ = tx.send(GateResolution::Cancelled);
        }
    }

    pub fn has_pending(&self, workflow_id: &WorkflowId) -> bool {
        self.pending.lock().contains_key(workflow_id)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
