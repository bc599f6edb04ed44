// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline runner: walks a workflow's stage graph to a terminal status.
//!
//! The runner owns every suspension point of an executor: node boundaries
//! (state persisted), approval gates (parked on the registry), and driver
//! calls (raced against the cancellation token). Node error, rejection,
//! cancellation, exhausted retries: every exit path closes the log with
//! exactly one terminal event.

use crate::driver::{DriverError, StageDriver, UsageReport};
use crate::emit::EventEmitter;
use crate::error::EngineError;
use crate::gate::{ApprovalGates, GateResolution};
use crate::notify::NotifyAdapter;
use crate::pipeline::{
    CommonState, EventSink, NodeCtx, NodeTransition, Pipeline, PipelineState, WorkflowInputs,
};
use am_core::event::{data_keys, EventDraft, EventType};
use am_core::tokens::TokenUsage;
use am_core::workflow::{StageVisit, Workflow, WorkflowId};
use am_core::Clock;
use am_storage::Database;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Everything a running executor needs.
pub(crate) struct RunnerDeps<C: Clock> {
    pub db: Arc<Database>,
    pub emitter: Arc<EventEmitter<C>>,
    pub gates: Arc<ApprovalGates<C>>,
    pub notify: Arc<dyn NotifyAdapter>,
    pub clock: C,
    /// Retries per node for transient driver failures
    pub stage_retry_limit: u32,
}

/// [`EventSink`] bound to one workflow.
struct WorkflowSink<'a, C: Clock> {
    workflow_id: WorkflowId,
    emitter: &'a EventEmitter<C>,
    db: &'a Database,
    clock: &'a C,
}

impl<C: Clock> EventSink for WorkflowSink<'_, C> {
    fn emit(&self, draft: EventDraft) -> Result<(), EngineError> {
        self.emitter.emit(self.workflow_id, draft)?;
        Ok(())
    }

    fn record_usage(&self, agent: &str, usage: &UsageReport) -> Result<(), EngineError> {
        self.db.record_token_usage(
            &TokenUsage {
                workflow_id: self.workflow_id,
                agent: agent.to_string(),
                model: usage.model.clone(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                cache_read_tokens: usage.cache_read_tokens,
                cache_write_tokens: usage.cache_write_tokens,
            },
            self.clock.epoch_ms(),
        )?;
        Ok(())
    }
}

/// Run one workflow to a terminal status. Never panics the supervisor:
/// every failure path converges on a terminal event.
pub(crate) async fn run_workflow<C: Clock>(
    deps: RunnerDeps<C>,
    pipeline: Arc<dyn Pipeline>,
    driver: Arc<dyn StageDriver>,
    workflow: Workflow,
    inputs: WorkflowInputs,
    cancel: CancellationToken,
    cancel_reason: Arc<Mutex<Option<String>>>,
) {
    let workflow_id = workflow.id;
    let correlation_id = inputs.correlation_id.clone();

    let sink = WorkflowSink {
        workflow_id,
        emitter: &deps.emitter,
        db: &deps.db,
        clock: &deps.clock,
    };

    let started = sink.emit(
        EventDraft::new(
            EventType::WorkflowStarted,
            "system",
            format!("Workflow started for {}", inputs.issue_id),
        )
        .with_data(serde_json::json!({
            "issue_id": inputs.issue_id,
            "worktree_path": workflow.worktree_path,
            "worktree_name": inputs.worktree_name,
            "pipeline": pipeline.name(),
        }))
        .with_correlation(correlation_id.clone()),
    );
    if let Err(e) = started {
        fail(&sink, &deps, workflow_id, &format!("could not start workflow: {e}")).await;
        return;
    }

    let mut state = match pipeline.initial_state(&inputs) {
        Ok(data) => PipelineState {
            common: CommonState {
                workflow_id,
                issue_id: inputs.issue_id.clone(),
                worktree_path: workflow.worktree_path.clone(),
                profile: inputs.profile.clone(),
            },
            data,
        },
        Err(e) => {
            fail(&sink, &deps, workflow_id, &format!("invalid pipeline inputs: {e}")).await;
            return;
        }
    };

    let graph = pipeline.graph();
    let mut stages: Vec<StageVisit> = Vec::new();
    let mut node_name = pipeline.entry_for(&state);

    loop {
        let node = match graph.get(node_name) {
            Some(node) => node,
            None => {
                fail(&sink, &deps, workflow_id, &format!("unknown pipeline node: {node_name}"))
                    .await;
                return;
            }
        };

        if emit_stage(&sink, EventType::StageStarted, node_name).is_err() {
            fail(&sink, &deps, workflow_id, "event emission failed").await;
            return;
        }
        stages.push(StageVisit {
            stage: node_name.to_string(),
            entered_at_ms: deps.clock.epoch_ms(),
        });

        // Run the node, retrying transient driver failures, racing the
        // cancellation token throughout.
        let mut attempts = 0u32;
        let transition = loop {
            let mut ctx = NodeCtx { state: &mut state, driver: driver.as_ref(), sink: &sink };
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    finish_cancelled(&sink, &deps, workflow_id, &cancel_reason).await;
                    return;
                }
                result = node.run(&mut ctx) => result,
            };

            match result {
                Ok(transition) => break transition,
                Err(EngineError::Driver(DriverError::Transient(reason)))
                    if attempts < deps.stage_retry_limit =>
                {
                    attempts += 1;
                    warn!(
                        workflow_id = %workflow_id,
                        stage = node_name,
                        attempts,
                        reason,
                        "transient stage failure, retrying"
                    );
                }
                Err(e) => {
                    if matches!(e, EngineError::Storage(_) | EngineError::State(_)) {
                        let _ = sink.emit(EventDraft::new(
                            EventType::SystemError,
                            "system",
                            format!("Internal error in stage '{node_name}': {e}"),
                        ));
                    }
                    fail(&sink, &deps, workflow_id, &e.to_string()).await;
                    return;
                }
            }
        };

        if emit_stage(&sink, EventType::StageCompleted, node_name).is_err() {
            fail(&sink, &deps, workflow_id, "event emission failed").await;
            return;
        }

        persist_state(&deps.db, workflow_id, &stages, &state);

        match transition {
            NodeTransition::Next(next) => {
                node_name = next;
            }

            NodeTransition::Complete => {
                let _ = sink.emit(EventDraft::new(
                    EventType::WorkflowCompleted,
                    "system",
                    "Workflow completed",
                ));
                info!(workflow_id = %workflow_id, "workflow completed");
                return;
            }

            NodeTransition::Gate { gate, resume } => {
                deps.notify
                    .notify(
                        &format!("Approval required: {}", inputs.issue_id),
                        &format!("Workflow is waiting at gate '{gate}'"),
                    )
                    .await;

                let resolution = match deps
                    .gates
                    .wait(workflow_id, gate, correlation_id.clone(), &cancel)
                    .await
                {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        fail(&sink, &deps, workflow_id, &e.to_string()).await;
                        return;
                    }
                };

                match resolution {
                    GateResolution::Approved { .. } => {
                        // Clients may have replaced the plan through the
                        // REST surface while the gate was parked; the
                        // persisted blob is authoritative across a gate.
                        if let Ok(Some(blob)) =
                            deps.db.workflow_state_blob(workflow_id.as_str())
                        {
                            if let Some(data) = blob.get("pipeline") {
                                state.data = data.clone();
                            }
                        }
                        node_name = resume;
                    }
                    GateResolution::Rejected { feedback } => {
                        // approval_rejected (terminal failed) was emitted by
                        // the resolver under the registry lock.
                        info!(workflow_id = %workflow_id, feedback, "workflow rejected at gate");
                        deps.notify
                            .notify(
                                &format!("Workflow rejected: {}", inputs.issue_id),
                                &feedback,
                            )
                            .await;
                        return;
                    }
                    GateResolution::Cancelled => {
                        finish_cancelled(&sink, &deps, workflow_id, &cancel_reason).await;
                        return;
                    }
                }
            }
        }
    }
}

fn emit_stage<C: Clock>(
    sink: &WorkflowSink<'_, C>,
    event_type: EventType,
    stage: &str,
) -> Result<(), EngineError> {
    let message = match event_type {
        EventType::StageStarted => format!("Stage started: {stage}"),
        _ => format!("Stage completed: {stage}"),
    };
    sink.emit(
        EventDraft::new(event_type, "system", message)
            .with_data(serde_json::json!({ data_keys::STAGE: stage })),
    )
}

/// Persist the state blob between nodes so crash recovery has the latest
/// picture. Best-effort: a failed persist is logged, not fatal.
fn persist_state(
    db: &Database,
    workflow_id: WorkflowId,
    stages: &[StageVisit],
    state: &PipelineState,
) {
    let blob = serde_json::json!({
        "stages": stages,
        "pipeline": state.data,
    });
    let current_stage = stages.last().map(|v| v.stage.as_str());
    if let Err(e) = db.update_workflow_state(workflow_id.as_str(), current_stage, &blob) {
        error!(workflow_id = %workflow_id, error = %e, "failed to persist workflow state");
    }
}

async fn fail<C: Clock>(
    sink: &WorkflowSink<'_, C>,
    deps: &RunnerDeps<C>,
    workflow_id: WorkflowId,
    reason: &str,
) {
    error!(workflow_id = %workflow_id, reason, "workflow failed");
    let _ = sink.emit(
        EventDraft::new(EventType::WorkflowFailed, "system", format!("Workflow failed: {reason}"))
            .with_data(serde_json::json!({ data_keys::REASON: reason })),
    );
    deps.notify.notify("Workflow failed", reason).await;
}

async fn finish_cancelled<C: Clock>(
    sink: &WorkflowSink<'_, C>,
    deps: &RunnerDeps<C>,
    workflow_id: WorkflowId,
    cancel_reason: &Mutex<Option<String>>,
) {
    // A gate may still be registered if cancellation hit outside wait().
    deps.gates.resolve_cancelled(&workflow_id);

    let reason = cancel_reason.lock().clone();
    let mut draft = EventDraft::new(EventType::WorkflowCancelled, "system", "Workflow cancelled");
    if let Some(reason) = &reason {
        draft = draft.with_data(serde_json::json!({ data_keys::REASON: reason }));
    }
    let _ = sink.emit(draft);
    info!(workflow_id = %workflow_id, reason = reason.as_deref(), "workflow cancelled");
}
