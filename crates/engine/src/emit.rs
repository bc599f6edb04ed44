// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event emission: sequence allocation, persistence, status cache, publish.
//!
//! The per-workflow mutex makes emit an atomic unit: the counter increment,
//! the append, and the status-cache write all happen under it. The lock is
//! released before bus publication so no subscriber I/O ever runs under an
//! allocator lock.

use crate::bus::EventBus;
use crate::error::EngineError;
use am_core::event::{data_keys, EventDraft, EventId, EventType, WorkflowEvent};
use am_core::workflow::WorkflowId;
use am_core::{Clock, WorkflowStatus};
use am_storage::Database;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Per-workflow monotonic sequence counter, lazily seeded from the store.
#[derive(Default)]
struct SequenceCounter {
    next: Option<u64>,
}

/// Emits events for all executors in the process.
pub struct EventEmitter<C: Clock> {
    db: Arc<Database>,
    bus: EventBus,
    clock: C,
    counters: Mutex<HashMap<WorkflowId, Arc<Mutex<SequenceCounter>>>>,
}

impl<C: Clock> EventEmitter<C> {
    pub fn new(db: Arc<Database>, bus: EventBus, clock: C) -> Self {
        Self { db, bus, clock, counters: Mutex::new(HashMap::new()) }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Persist a draft as the workflow's next event and publish it.
    ///
    /// State-affecting drafts also advance the status cache, validated by
    /// the transition table, inside the same critical section. A sequence
    /// collision from the store means allocator state diverged and is
    /// returned untouched; fatal to the calling executor.
    pub fn emit(
        &self,
        workflow_id: WorkflowId,
        draft: EventDraft,
    ) -> Result<Arc<WorkflowEvent>, EngineError> {
        let cell = {
            let mut counters = self.counters.lock();
            Arc::clone(counters.entry(workflow_id).or_default())
        };

        let mut counter = cell.lock();
        // Double-checked lazy seed: first emit for this workflow reads the
        // store's max under the per-workflow lock.
        let sequence = match counter.next {
            Some(next) => next,
            None => self.db.max_sequence(workflow_id.as_str())? + 1,
        };

        let event = WorkflowEvent {
            id: EventId::new(),
            workflow_id,
            sequence,
            timestamp_ms: self.clock.epoch_ms(),
            agent: draft.agent,
            event_type: draft.event_type,
            message: draft.message,
            data: draft.data,
            correlation_id: draft.correlation_id,
        };

        // Pre-validate the status effect so a terminal workflow never grows
        // another state-affecting event (terminal immutability). All status
        // writes funnel through this per-workflow lock, so the check cannot
        // go stale before the write below.
        let effect = status_effect(&event);
        if let Some((to, _)) = &effect {
            let current = self
                .db
                .workflow_status(workflow_id.as_str())?
                .ok_or_else(|| {
                    am_storage::StorageError::WorkflowNotFound(workflow_id.to_string())
                })?;
            WorkflowStatus::validate_transition(current, *to)
                .map_err(am_storage::StorageError::from)?;
        }

        self.db.append_event(&event)?;

        if let Some((status, reason)) = effect {
            self.db.set_status(
                workflow_id.as_str(),
                status,
                reason.as_deref(),
                event.timestamp_ms,
            )?;
        } else if event.event_type == EventType::StageStarted {
            if let Some(stage) = event.data_str(data_keys::STAGE) {
                self.db.set_current_stage(workflow_id.as_str(), stage)?;
            }
        }

        counter.next = Some(sequence + 1);
        drop(counter);

        debug!(event = %event.log_summary(), "emitted");
        let event = Arc::new(event);
        self.bus.publish(Arc::clone(&event));
        Ok(event)
    }

    /// Drop the cached counter for a finished workflow.
    pub fn forget(&self, workflow_id: &WorkflowId) {
        self.counters.lock().remove(workflow_id);
    }
}

/// Status written by a state-affecting event, with an optional failure
/// reason. Mirrors the projection handlers so cache and log agree.
fn status_effect(event: &WorkflowEvent) -> Option<(WorkflowStatus, Option<String>)> {
    match event.event_type {
        EventType::WorkflowStarted => Some((WorkflowStatus::InProgress, None)),
        EventType::ApprovalRequired => Some((WorkflowStatus::Blocked, None)),
        EventType::ApprovalGranted => Some((WorkflowStatus::InProgress, None)),
        EventType::ApprovalRejected => {
            let feedback =
                event.data_str(data_keys::FEEDBACK).unwrap_or(&event.message).to_string();
            Some((WorkflowStatus::Failed, Some(feedback)))
        }
        EventType::WorkflowCompleted => Some((WorkflowStatus::Completed, None)),
        EventType::WorkflowFailed => {
            let reason = event.data_str(data_keys::REASON).unwrap_or(&event.message).to_string();
            Some((WorkflowStatus::Failed, Some(reason)))
        }
        EventType::WorkflowCancelled => {
            let reason = event.data_str(data_keys::REASON).map(str::to_string);
            Some((WorkflowStatus::Cancelled, reason))
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "emit_tests.rs"]
mod tests;
