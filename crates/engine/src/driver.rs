// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage driver seam.
//!
//! Drivers are the black box that does the actual work of a stage (in
//! production an LLM agent session, in tests a script). The engine sees
//! three typed calls and a driver-reported usage figure per call.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-support"))]
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Driver failure split by retryability. Transient errors are retried per
/// the runner's stage policy; fatal ones fail the workflow immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("transient driver failure: {0}")]
    Transient(String),
    #[error("driver failure: {0}")]
    Fatal(String),
}

/// Token counts reported by a driver for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

/// One unit of plan work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// The architect's output: an ordered set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub summary: String,
    pub tasks: Vec<PlanTask>,
}

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub profile: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Planned {
    pub plan: Plan,
    pub usage: Option<UsageReport>,
}

#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub worktree_path: PathBuf,
    pub task: PlanTask,
    /// Reviewer feedback when re-entering after a revision request
    pub revision_feedback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskResult {
    pub summary: String,
    /// Worktree-relative paths the driver touched
    pub files_changed: Vec<PathBuf>,
    pub usage: Option<UsageReport>,
}

#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub worktree_path: PathBuf,
    pub task: PlanTask,
    pub implementation_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested { feedback: String },
}

#[derive(Debug, Clone)]
pub struct ReviewResult {
    pub verdict: ReviewVerdict,
    pub usage: Option<UsageReport>,
}

/// Executes pipeline stages. Implementations must be cancel-safe: the runner
/// may drop a call future at any suspension point.
#[async_trait]
pub trait StageDriver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn produce_plan(&self, req: PlanRequest) -> Result<Planned, DriverError>;

    async fn execute_task(&self, req: TaskRequest) -> Result<TaskResult, DriverError>;

    async fn review_task(&self, req: ReviewRequest) -> Result<ReviewResult, DriverError>;
}

/// Driver that performs no real work: one-task plans, instant success,
/// approving reviews. The default wiring for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDriver;

#[async_trait]
impl StageDriver for NoopDriver {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn produce_plan(&self, req: PlanRequest) -> Result<Planned, DriverError> {
        Ok(Planned {
            plan: Plan {
                summary: format!("Resolve {}", req.issue_id),
                tasks: vec![PlanTask {
                    title: format!("Implement {}", req.issue_id),
                    description: String::new(),
                }],
            },
            usage: None,
        })
    }

    async fn execute_task(&self, req: TaskRequest) -> Result<TaskResult, DriverError> {
        Ok(TaskResult {
            summary: format!("Completed task '{}'", req.task.title),
            files_changed: Vec::new(),
            usage: None,
        })
    }

    async fn review_task(&self, _req: ReviewRequest) -> Result<ReviewResult, DriverError> {
        Ok(ReviewResult { verdict: ReviewVerdict::Approved, usage: None })
    }
}

/// Registry of named drivers. "noop" is always present.
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: HashMap<&'static str, Arc<dyn StageDriver>>,
    default: &'static str,
}

impl DriverRegistry {
    pub fn builtin() -> Self {
        let mut drivers: HashMap<&'static str, Arc<dyn StageDriver>> = HashMap::new();
        drivers.insert("noop", Arc::new(NoopDriver));
        Self { drivers, default: "noop" }
    }

    pub fn register(&mut self, driver: Arc<dyn StageDriver>) {
        self.drivers.insert(driver.name(), driver);
    }

    pub fn with_default(mut self, name: &'static str) -> Self {
        self.default = name;
        self
    }

    /// Resolve a driver by name, or the default when unnamed.
    pub fn get(&self, name: Option<&str>) -> Option<Arc<dyn StageDriver>> {
        let name = name.unwrap_or(self.default);
        self.drivers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.drivers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

// --- test support ---

/// Recorded call to [`FakeDriver`].
#[cfg(any(test, feature = "test-support"))]
#[derive(Debug, Clone)]
pub enum DriverCall {
    ProducePlan { issue_id: String },
    ExecuteTask { title: String, revision_feedback: Option<String> },
    ReviewTask { title: String },
}

/// Scripted driver for deterministic tests.
///
/// Outcomes are queued per call kind; when a queue is empty the driver
/// behaves like [`NoopDriver`]. All calls are recorded.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Mutex<FakeDriverState>>,
}

#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
struct FakeDriverState {
    calls: Vec<DriverCall>,
    plans: std::collections::VecDeque<Result<Planned, DriverError>>,
    tasks: std::collections::VecDeque<Result<TaskResult, DriverError>>,
    reviews: std::collections::VecDeque<Result<ReviewResult, DriverError>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    pub fn push_plan(&self, result: Result<Planned, DriverError>) {
        self.inner.lock().plans.push_back(result);
    }

    pub fn push_task(&self, result: Result<TaskResult, DriverError>) {
        self.inner.lock().tasks.push_back(result);
    }

    pub fn push_review(&self, result: Result<ReviewResult, DriverError>) {
        self.inner.lock().reviews.push_back(result);
    }

    /// Queue a plan with the given task titles.
    pub fn plan_with_tasks(&self, titles: &[&str]) {
        self.push_plan(Ok(Planned {
            plan: Plan {
                summary: "scripted plan".to_string(),
                tasks: titles
                    .iter()
                    .map(|t| PlanTask { title: t.to_string(), description: String::new() })
                    .collect(),
            },
            usage: None,
        }));
    }

    /// Queue a review that requests changes with the given feedback.
    pub fn review_changes_requested(&self, feedback: &str) {
        self.push_review(Ok(ReviewResult {
            verdict: ReviewVerdict::ChangesRequested { feedback: feedback.to_string() },
            usage: None,
        }));
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl StageDriver for FakeDriver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn produce_plan(&self, req: PlanRequest) -> Result<Planned, DriverError> {
        let scripted = {
            let mut state = self.inner.lock();
            state.calls.push(DriverCall::ProducePlan { issue_id: req.issue_id.clone() });
            state.plans.pop_front()
        };
        match scripted {
            Some(result) => result,
            None => NoopDriver.produce_plan(req).await,
        }
    }

    async fn execute_task(&self, req: TaskRequest) -> Result<TaskResult, DriverError> {
        let scripted = {
            let mut state = self.inner.lock();
            state.calls.push(DriverCall::ExecuteTask {
                title: req.task.title.clone(),
                revision_feedback: req.revision_feedback.clone(),
            });
            state.tasks.pop_front()
        };
        match scripted {
            Some(result) => result,
            None => NoopDriver.execute_task(req).await,
        }
    }

    async fn review_task(&self, req: ReviewRequest) -> Result<ReviewResult, DriverError> {
        let scripted = {
            let mut state = self.inner.lock();
            state.calls.push(DriverCall::ReviewTask { title: req.task.title.clone() });
            state.reviews.pop_front()
        };
        match scripted {
            Some(result) => result,
            None => NoopDriver.review_task(req).await,
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
