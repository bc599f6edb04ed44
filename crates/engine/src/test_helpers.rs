// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine test harness: real store in a temp dir, fake everything else.

#![allow(dead_code)]

use crate::bus::EventBus;
use crate::driver::{DriverRegistry, FakeDriver};
use crate::emit::EventEmitter;
use crate::gate::ApprovalGates;
use crate::notify::FakeNotify;
use crate::pipeline::PipelineRegistry;
use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorDeps};
use am_core::{FakeClock, WorkflowStatus};
use am_storage::Database;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) struct Harness {
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

pub(crate) fn harness() -> Harness {
    harness_with(SupervisorConfig::default())
}

pub(crate) fn harness_with(config: SupervisorConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(&dir.path().join("amelia.db")).unwrap());
    let clock = FakeClock::new();
    let bus = EventBus::new(64);
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

    Harness { dir, db, bus, emitter, gates, supervisor, driver, notify, clock }
}

impl Harness {
    /// Create a directory that passes the worktree checks.
    pub fn make_worktree(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        path
    }

    /// Poll the store until the workflow reaches `status` (5s budget).
    pub async fn wait_status(&self, workflow_id: &str, status: WorkflowStatus) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let current = self
                .db
                .get_workflow(workflow_id)
                .unwrap()
                .map(|wf| wf.status);
            if current == Some(status) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("workflow {workflow_id} never reached {status}, last seen {current:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Event types for a workflow in sequence order.
    pub fn event_types(&self, workflow_id: &str) -> Vec<am_core::EventType> {
        self.db
            .events_for(workflow_id, None)
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}
