// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.
//!
//! One `Specs` harness = one daemon's worth of engine over a temp-dir store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use am_core::{EventType, FakeClock, WorkflowStatus};
use am_engine::{
    ApprovalGates, DriverRegistry, EventBus, EventEmitter, FakeDriver, FakeNotify,
    PipelineRegistry, StartRequest, Supervisor, SupervisorConfig, SupervisorDeps,
};
use am_storage::Database;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Spec polling budget
pub const SPEC_WAIT_MAX_MS: u64 = 5000;
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;

pub struct Specs {
    pub dir: TempDir,
    pub db: Arc<Database>,
    pub bus: EventBus,
    pub emitter: Arc<EventEmitter<FakeClock>>,
    pub gates: Arc<ApprovalGates<FakeClock>>,
    pub supervisor: Supervisor<FakeClock>,
    pub driver: FakeDriver,
    pub notify: FakeNotify,
    pub clock: FakeClock,
}

pub fn specs() -> Specs {
    specs_with(SupervisorConfig::default())
}

pub fn specs_with(config: SupervisorConfig) -> Specs {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(&dir.path().join("amelia.db")).unwrap());
    let clock = FakeClock::new();
    let bus = EventBus::new(256);
    let emitter = Arc::new(EventEmitter::new(Arc::clone(&db), bus.clone(), clock.clone()));
    let gates = Arc::new(ApprovalGates::new(Arc::clone(&emitter)));
    let driver = FakeDriver::new();
    let notify = FakeNotify::new();

    let mut drivers = DriverRegistry::builtin();
    drivers.register(Arc::new(driver.clone()));
    let drivers = drivers.with_default("fake");

    let supervisor = Supervisor::new(
        SupervisorDeps {
            db: Arc::clone(&db),
            emitter: Arc::clone(&emitter),
            gates: Arc::clone(&gates),
            pipelines: PipelineRegistry::builtin(),
            drivers,
            notify: Arc::new(notify.clone()),
            clock: clock.clone(),
        },
        config,
    );

    Specs { dir, db, bus, emitter, gates, supervisor, driver, notify, clock }
}

impl Specs {
    /// A directory that passes the supervisor's worktree checks.
    pub fn make_worktree(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        path
    }

    /// Start a workflow with defaults and return its id string.
    pub fn start(&self, issue_id: &str, worktree: &PathBuf) -> String {
        self.supervisor
            .start(StartRequest::new(issue_id, worktree))
            .unwrap()
            .id
            .to_string()
    }

    /// Poll until the workflow reaches `status`.
    pub async fn wait_status(&self, workflow_id: &str, status: WorkflowStatus) {
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
        loop {
            let current = self.db.get_workflow(workflow_id).unwrap().map(|wf| wf.status);
            if current == Some(status) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("workflow {workflow_id} never reached {status}, last {current:?}");
            }
            tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
        }
    }

    /// Drive a default workflow to its plan gate and return its id.
    pub async fn start_blocked(&self, issue_id: &str, worktree_name: &str) -> String {
        let worktree = self.make_worktree(worktree_name);
        let id = self.start(issue_id, &worktree);
        self.wait_status(&id, WorkflowStatus::Blocked).await;
        id
    }

    pub fn event_types(&self, workflow_id: &str) -> Vec<EventType> {
        self.db
            .events_for(workflow_id, None)
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub fn sequences(&self, workflow_id: &str) -> Vec<u64> {
        self.db
            .events_for(workflow_id, None)
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect()
    }
}
