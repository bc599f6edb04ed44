// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! am-engine: workflow execution engine for the Amelia orchestrator.
//!
//! Owns the sequence allocator, the in-process event bus, approval gate
//! rendezvous, the per-worktree supervisor, the pipeline runner, and the
//! worktree health monitor.

mod bus;
mod driver;
mod emit;
mod error;
mod gate;
mod monitor;
mod notify;
pub mod pipeline;
mod runner;
mod supervisor;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bus::{BusMessage, BusSubscription, EventBus, SubscriptionFilter};
pub use driver::{
    DriverError, DriverRegistry, NoopDriver, Plan, PlanRequest, PlanTask, Planned, ReviewRequest,
    ReviewResult, ReviewVerdict, StageDriver, TaskRequest, TaskResult, UsageReport,
};
#[cfg(any(test, feature = "test-support"))]
pub use driver::{DriverCall, FakeDriver};
pub use emit::EventEmitter;
pub use error::EngineError;
pub use gate::{ApprovalGates, GateResolution};
pub use monitor::{worktree_is_healthy, WorktreeHealthMonitor};
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotify;
pub use notify::{DesktopNotify, NoopNotify, NotifyAdapter};
pub use pipeline::{Pipeline, PipelineRegistry, WorkflowInputs};
pub use supervisor::{StartRequest, Supervisor, SupervisorConfig, SupervisorDeps};
