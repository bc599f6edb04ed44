// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow supervisor: one executor task per worktree.
//!
//! The supervisor owns the `worktree_path → executor` map and everything
//! that guards it: the conflict check, the global concurrency cap, and the
//! cleanup handler that removes an entry however its task exits. The
//! database's partial unique index backs the in-memory conflict check, so a
//! second supervisor instance (or a crashed map) can never double-book a
//! worktree.

use crate::driver::DriverRegistry;
use crate::emit::EventEmitter;
use crate::error::EngineError;
use crate::gate::ApprovalGates;
use crate::notify::NotifyAdapter;
use crate::pipeline::{PipelineRegistry, WorkflowInputs};
use crate::runner::{run_workflow, RunnerDeps};
use am_core::event::{data_keys, EventDraft, EventType};
use am_core::workflow::{validate_issue_id, validate_worktree_path, Workflow, WorkflowId};
use am_core::{Clock, WorkflowStatus};
use am_storage::{Database, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Supervisor tuning knobs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Global cap on concurrently active executors
    pub max_concurrent: usize,
    /// Retry-After hint handed to clients bouncing off the cap
    pub retry_after_secs: u64,
    /// Transient-driver retries per stage
    pub stage_retry_limit: u32,
    /// Review cycles a task gets before it fails the workflow
    pub max_review_iterations: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            retry_after_secs: 30,
            stage_retry_limit: 2,
            max_review_iterations: 3,
        }
    }
}

/// Constructor dependencies.
pub struct SupervisorDeps<C: Clock> {
    pub db: Arc<Database>,
    pub emitter: Arc<EventEmitter<C>>,
    pub gates: Arc<ApprovalGates<C>>,
    pub pipelines: PipelineRegistry,
    pub drivers: DriverRegistry,
    pub notify: Arc<dyn NotifyAdapter>,
    pub clock: C,
}

/// A client's request to start a workflow.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: Option<String>,
    pub pipeline: Option<String>,
    pub driver: Option<String>,
    pub profile: Option<String>,
    pub external_plan: Option<String>,
    pub correlation_id: Option<String>,
}

impl StartRequest {
    pub fn new(issue_id: impl Into<String>, worktree_path: impl Into<PathBuf>) -> Self {
        Self {
            issue_id: issue_id.into(),
            worktree_path: worktree_path.into(),
            worktree_name: None,
            pipeline: None,
            driver: None,
            profile: None,
            external_plan: None,
            correlation_id: None,
        }
    }
}

#[derive(Clone)]
struct ExecutorEntry {
    workflow_id: WorkflowId,
    cancel: CancellationToken,
    cancel_reason: Arc<Mutex<Option<String>>>,
}

struct Inner<C: Clock> {
    db: Arc<Database>,
    emitter: Arc<EventEmitter<C>>,
    gates: Arc<ApprovalGates<C>>,
    pipelines: PipelineRegistry,
    drivers: DriverRegistry,
    notify: Arc<dyn NotifyAdapter>,
    clock: C,
    config: SupervisorConfig,
    active: Mutex<HashMap<PathBuf, ExecutorEntry>>,
}

/// Cheap-to-clone handle to the executor supervisor.
pub struct Supervisor<C: Clock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn new(deps: SupervisorDeps<C>, config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                db: deps.db,
                emitter: deps.emitter,
                gates: deps.gates,
                pipelines: deps.pipelines,
                drivers: deps.drivers,
                notify: deps.notify,
                clock: deps.clock,
                config,
                active: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn gates(&self) -> &ApprovalGates<C> {
        &self.inner.gates
    }

    /// Start a workflow: validate, reserve the worktree, spawn the executor.
    pub fn start(&self, req: StartRequest) -> Result<Workflow, EngineError> {
        validate_issue_id(&req.issue_id)?;
        validate_worktree_path(&req.worktree_path)?;

        let worktree_path = std::fs::canonicalize(&req.worktree_path).map_err(|e| {
            EngineError::InvalidWorktree {
                path: req.worktree_path.clone(),
                reason: e.to_string(),
            }
        })?;
        if !worktree_path.is_dir() {
            return Err(EngineError::InvalidWorktree {
                path: worktree_path,
                reason: "not a directory".to_string(),
            });
        }
        // .git is a directory in a main repository, a file in a linked worktree
        if !worktree_path.join(".git").exists() {
            return Err(EngineError::InvalidWorktree {
                path: worktree_path,
                reason: "no .git marker (not a git worktree)".to_string(),
            });
        }

        let pipeline = self.inner.pipelines.get(req.pipeline.as_deref())?;
        let driver = self
            .inner
            .drivers
            .get(req.driver.as_deref())
            .ok_or_else(|| {
                EngineError::UnknownDriver(req.driver.clone().unwrap_or_default())
            })?;

        let worktree_name = req.worktree_name.clone().unwrap_or_else(|| {
            worktree_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "worktree".to_string())
        });

        let workflow = Workflow {
            id: WorkflowId::new(),
            issue_id: req.issue_id.clone(),
            worktree_path: worktree_path.clone(),
            worktree_name: worktree_name.clone(),
            pipeline: pipeline.name().to_string(),
            status: WorkflowStatus::Pending,
            created_at_ms: self.inner.clock.epoch_ms(),
            started_at_ms: None,
            completed_at_ms: None,
            current_stage: None,
            failure_reason: None,
            stages: Vec::new(),
        };

        // Reserve the worktree and spawn under one critical section so two
        // racing starts can't both pass the checks (S1 invariant).
        let mut active = self.inner.active.lock();

        if let Some(entry) = active.get(&worktree_path) {
            let existing_status = self
                .inner
                .db
                .get_workflow(entry.workflow_id.as_str())
                .ok()
                .flatten()
                .map(|wf| wf.status)
                .unwrap_or(WorkflowStatus::Pending);
            return Err(EngineError::WorkflowConflict {
                worktree_path,
                existing_id: entry.workflow_id,
                existing_status,
            });
        }

        if active.len() >= self.inner.config.max_concurrent {
            return Err(EngineError::ConcurrencyLimit {
                active: active.len(),
                limit: self.inner.config.max_concurrent,
                retry_after_secs: self.inner.config.retry_after_secs,
            });
        }

        // The partial unique index is the backstop for executors this
        // process doesn't know about (e.g. rows from a dying run).
        self.inner.db.insert_workflow(&workflow).map_err(|e| match e {
            StorageError::WorktreeConflict { worktree_path, existing_id, existing_status } => {
                EngineError::WorkflowConflict { worktree_path, existing_id, existing_status }
            }
            other => EngineError::Storage(other),
        })?;

        let entry = ExecutorEntry {
            workflow_id: workflow.id,
            cancel: CancellationToken::new(),
            cancel_reason: Arc::new(Mutex::new(None)),
        };

        let inputs = WorkflowInputs {
            issue_id: req.issue_id,
            worktree_path: worktree_path.clone(),
            worktree_name,
            profile: req.profile,
            external_plan: req.external_plan,
            max_review_iterations: self.inner.config.max_review_iterations,
            correlation_id: req.correlation_id,
        };

        // Reserve before spawning: the executor's cleanup handler must always
        // find its own entry, even if it finishes immediately.
        active.insert(worktree_path.clone(), entry.clone());

        let inner = Arc::clone(&self.inner);
        let task_workflow = workflow.clone();
        let task_entry = entry.clone();
        let task_path = worktree_path.clone();
        tokio::spawn(async move {
            let deps = RunnerDeps {
                db: Arc::clone(&inner.db),
                emitter: Arc::clone(&inner.emitter),
                gates: Arc::clone(&inner.gates),
                notify: Arc::clone(&inner.notify),
                clock: inner.clock.clone(),
                stage_retry_limit: inner.config.stage_retry_limit,
            };
            let workflow_id = task_workflow.id;

            run_workflow(
                deps,
                pipeline,
                driver,
                task_workflow,
                inputs,
                task_entry.cancel.clone(),
                Arc::clone(&task_entry.cancel_reason),
            )
            .await;

            // Cleanup handler: drop the reservation whichever way the task
            // exited, but never a successor's entry.
            let mut active = inner.active.lock();
            if active.get(&task_path).is_some_and(|e| e.workflow_id == workflow_id) {
                active.remove(&task_path);
            }
            drop(active);
            inner.emitter.forget(&workflow_id);
        });
        drop(active);

        info!(workflow_id = %workflow.id, issue_id = %workflow.issue_id, "workflow started");
        Ok(workflow)
    }

    /// Approve the pending gate of a workflow.
    pub fn approve(
        &self,
        workflow_id: &str,
        correlation_id: Option<String>,
    ) -> Result<(), EngineError> {
        let workflow = self.require_workflow(workflow_id)?;
        self.inner.gates.resolve_approve(workflow.id, correlation_id)
    }

    /// Reject the pending gate with feedback and cancel the executor.
    pub fn reject(&self, workflow_id: &str, feedback: String) -> Result<(), EngineError> {
        let workflow = self.require_workflow(workflow_id)?;
        self.inner.gates.resolve_reject(workflow.id, feedback, None)?;

        // The waiter exits on the rejection; the token is insurance against
        // an executor wedged outside its gate.
        if let Some(entry) = self.entry_for(&workflow) {
            entry.cancel.cancel();
        }
        Ok(())
    }

    /// Cancel a workflow. Idempotent: a terminal workflow just reports its
    /// status; an active one is cancelled and will emit
    /// `workflow_cancelled` from its executor.
    pub fn cancel(
        &self,
        workflow_id: &str,
        reason: Option<String>,
    ) -> Result<WorkflowStatus, EngineError> {
        let workflow = self.require_workflow(workflow_id)?;
        if workflow.status.is_terminal() {
            return Ok(workflow.status);
        }

        match self.entry_for(&workflow) {
            Some(entry) => {
                *entry.cancel_reason.lock() = reason;
                entry.cancel.cancel();
            }
            None => {
                // No executor in this process (recovered row): emit the
                // terminal event directly.
                warn!(workflow_id, "cancelling workflow with no live executor");
                let mut draft = EventDraft::new(
                    EventType::WorkflowCancelled,
                    "system",
                    "Workflow cancelled",
                );
                if let Some(reason) = &reason {
                    draft = draft.with_data(serde_json::json!({ data_keys::REASON: reason }));
                }
                self.inner.emitter.emit(workflow.id, draft)?;
            }
        }
        Ok(workflow.status)
    }

    /// Active worktrees and their workflows, for the health monitor.
    pub fn active_worktrees(&self) -> Vec<(PathBuf, WorkflowId)> {
        self.inner
            .active
            .lock()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.workflow_id))
            .collect()
    }

    /// The active workflow pinned to a worktree, if any.
    pub fn workflow_by_worktree(&self, path: &std::path::Path) -> Option<WorkflowId> {
        self.inner.active.lock().get(path).map(|entry| entry.workflow_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Wait for executors to finish or park at a gate, up to `timeout`.
    /// Returns true when every remaining executor is blocked (or none are
    /// left) within the window.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.only_blocked_remain() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Cancel every remaining executor and wait up to `grace` for the map
    /// to empty. Late executors keep running detached; their next status
    /// write observes a terminal row and short-circuits.
    pub async fn shutdown(&self, grace: Duration) {
        let entries: Vec<ExecutorEntry> = {
            let active = self.inner.active.lock();
            active.values().cloned().collect()
        };
        if entries.is_empty() {
            return;
        }

        info!(count = entries.len(), "cancelling remaining executors for shutdown");
        for entry in &entries {
            *entry.cancel_reason.lock() = Some("Server shutting down".to_string());
            entry.cancel.cancel();
        }

        let deadline = tokio::time::Instant::now() + grace;
        while tokio::time::Instant::now() < deadline {
            if self.inner.active.lock().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        warn!(
            remaining = self.inner.active.lock().len(),
            "executors still live after shutdown grace"
        );
    }

    fn only_blocked_remain(&self) -> bool {
        let entries: Vec<ExecutorEntry> = {
            let active = self.inner.active.lock();
            active.values().cloned().collect()
        };
        entries.iter().all(|entry| {
            self.inner
                .db
                .get_workflow(entry.workflow_id.as_str())
                .ok()
                .flatten()
                .is_some_and(|wf| wf.status == WorkflowStatus::Blocked || wf.status.is_terminal())
        })
    }

    fn entry_for(&self, workflow: &Workflow) -> Option<ExecutorEntry> {
        let active = self.inner.active.lock();
        active
            .get(&workflow.worktree_path)
            .filter(|entry| entry.workflow_id == workflow.id)
            .cloned()
    }

    fn require_workflow(&self, workflow_id: &str) -> Result<Workflow, EngineError> {
        self.inner
            .db
            .get_workflow(workflow_id)?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
