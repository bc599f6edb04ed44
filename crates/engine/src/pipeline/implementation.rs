// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The default Architect → Developer ⇄ Reviewer pipeline.
//!
//! Stages: `planning` produces a plan and parks at the `plan_approval` gate
//! (an external plan enters at `validation` instead, which goes straight to
//! the gate). After approval, `implementation` and `review` alternate per
//! task; a task that exceeds its review budget fails the workflow.

use super::{NodeCtx, NodeTransition, Pipeline, PipelineState, StageNode, StateGraph, WorkflowInputs};
use crate::driver::{Plan, PlanRequest, PlanTask, ReviewRequest, ReviewVerdict, TaskRequest};
use crate::error::EngineError;
use am_core::event::{data_keys, EventDraft, EventType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "implementation";

/// Stage names, also the `stage` payload on stage events.
pub mod stages {
    pub const PLANNING: &str = "planning";
    pub const VALIDATION: &str = "validation";
    pub const IMPLEMENTATION: &str = "implementation";
    pub const REVIEW: &str = "review";
}

/// Gate names.
pub mod gates {
    pub const PLAN_APPROVAL: &str = "plan_approval";
}

/// Pipeline-private state carried in the workflow's state blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplementationState {
    pub plan: Option<Plan>,
    /// The plan was supplied by the client, not produced by the architect
    pub external_plan: bool,
    pub current_task: usize,
    pub review_iteration: u32,
    pub max_review_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<String>,
}

impl ImplementationState {
    fn read(state: &PipelineState) -> Result<Self, EngineError> {
        Ok(serde_json::from_value(state.data.clone())?)
    }

    fn write(self, state: &mut PipelineState) -> Result<(), EngineError> {
        state.data = serde_json::to_value(self)?;
        Ok(())
    }

    fn task(&self, index: usize) -> Option<&PlanTask> {
        self.plan.as_ref()?.tasks.get(index)
    }

    fn task_count(&self) -> usize {
        self.plan.as_ref().map(|p| p.tasks.len()).unwrap_or(0)
    }
}

/// Parse client-supplied plan content into tasks: one per top-level markdown
/// bullet, or a single catch-all task when the content has no bullets.
pub fn plan_from_markdown(content: &str) -> Plan {
    let tasks: Vec<PlanTask> = content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let bullet = trimmed
                .strip_prefix("- [ ] ")
                .or_else(|| trimmed.strip_prefix("- [x] "))
                .or_else(|| trimmed.strip_prefix("- "))
                .or_else(|| trimmed.strip_prefix("* "))?;
            // Only top-level bullets become tasks; indented ones are detail
            if line.starts_with(char::is_whitespace) {
                return None;
            }
            Some(PlanTask { title: bullet.trim().to_string(), description: String::new() })
        })
        .filter(|t| !t.title.is_empty())
        .collect();

    if tasks.is_empty() {
        Plan {
            summary: "External plan".to_string(),
            tasks: vec![PlanTask {
                title: "Apply the supplied plan".to_string(),
                description: content.trim().to_string(),
            }],
        }
    } else {
        Plan { summary: "External plan".to_string(), tasks }
    }
}

pub struct ImplementationPipeline;

impl Pipeline for ImplementationPipeline {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Implementation"
    }

    fn description(&self) -> &'static str {
        "Plan, validate at an approval gate, then implement and review each task"
    }

    fn initial_state(&self, inputs: &WorkflowInputs) -> Result<serde_json::Value, EngineError> {
        let state = ImplementationState {
            plan: inputs.external_plan.as_deref().map(plan_from_markdown),
            external_plan: inputs.external_plan.is_some(),
            max_review_iterations: inputs.max_review_iterations,
            ..Default::default()
        };
        Ok(serde_json::to_value(state)?)
    }

    fn graph(&self) -> StateGraph {
        StateGraph::new(stages::PLANNING)
            .node(stages::PLANNING, PlanningNode)
            .node(stages::VALIDATION, ValidationNode)
            .node(stages::IMPLEMENTATION, ImplementationNode)
            .node(stages::REVIEW, ReviewNode)
    }

    fn entry_for(&self, state: &PipelineState) -> &'static str {
        match ImplementationState::read(state) {
            Ok(data) if data.external_plan => stages::VALIDATION,
            _ => stages::PLANNING,
        }
    }
}

/// Architect: produce the plan, then ask for validation.
struct PlanningNode;

#[async_trait]
impl StageNode for PlanningNode {
    async fn run(&self, ctx: &mut NodeCtx<'_>) -> Result<NodeTransition, EngineError> {
        let mut data = ImplementationState::read(ctx.state)?;

        let planned = ctx
            .driver
            .produce_plan(PlanRequest {
                issue_id: ctx.state.common.issue_id.clone(),
                worktree_path: ctx.state.common.worktree_path.clone(),
                profile: ctx.state.common.profile.clone(),
            })
            .await?;
        if let Some(usage) = &planned.usage {
            ctx.sink.record_usage("architect", usage)?;
        }

        data.plan = Some(planned.plan);
        data.write(ctx.state)?;

        Ok(NodeTransition::Gate { gate: gates::PLAN_APPROVAL, resume: stages::IMPLEMENTATION })
    }
}

/// External-plan entry: the plan already exists, go straight to the gate.
struct ValidationNode;

#[async_trait]
impl StageNode for ValidationNode {
    async fn run(&self, _ctx: &mut NodeCtx<'_>) -> Result<NodeTransition, EngineError> {
        Ok(NodeTransition::Gate { gate: gates::PLAN_APPROVAL, resume: stages::IMPLEMENTATION })
    }
}

/// Developer: execute the current task, honouring any revision feedback.
struct ImplementationNode;

#[async_trait]
impl StageNode for ImplementationNode {
    async fn run(&self, ctx: &mut NodeCtx<'_>) -> Result<NodeTransition, EngineError> {
        let mut data = ImplementationState::read(ctx.state)?;
        let task = match data.task(data.current_task) {
            Some(task) => task.clone(),
            // Empty plan: nothing to implement
            None => return Ok(NodeTransition::Complete),
        };

        if data.review_iteration == 0 {
            ctx.sink.emit(
                EventDraft::new(
                    EventType::TaskStarted,
                    "developer",
                    format!("Task started: {}", task.title),
                )
                .with_data(serde_json::json!({ data_keys::TASK: data.current_task })),
            )?;
        }

        let result = ctx
            .driver
            .execute_task(TaskRequest {
                worktree_path: ctx.state.common.worktree_path.clone(),
                task: task.clone(),
                revision_feedback: data.last_feedback.take(),
            })
            .await?;
        if let Some(usage) = &result.usage {
            ctx.sink.record_usage("developer", usage)?;
        }

        for path in &result.files_changed {
            ctx.sink.emit(
                EventDraft::new(
                    EventType::FileModified,
                    "developer",
                    format!("Modified {}", path.display()),
                )
                .with_data(serde_json::json!({ "path": path })),
            )?;
        }

        data.last_summary = Some(result.summary);
        data.write(ctx.state)?;

        Ok(NodeTransition::Next(stages::REVIEW))
    }
}

/// Reviewer: approve the task or send it back, within the review budget.
struct ReviewNode;

#[async_trait]
impl StageNode for ReviewNode {
    async fn run(&self, ctx: &mut NodeCtx<'_>) -> Result<NodeTransition, EngineError> {
        let mut data = ImplementationState::read(ctx.state)?;
        let task = match data.task(data.current_task) {
            Some(task) => task.clone(),
            None => return Ok(NodeTransition::Complete),
        };

        ctx.sink.emit(
            EventDraft::new(
                EventType::ReviewRequested,
                "reviewer",
                format!("Review requested: {}", task.title),
            )
            .with_data(serde_json::json!({ data_keys::TASK: data.current_task })),
        )?;

        let result = ctx
            .driver
            .review_task(ReviewRequest {
                worktree_path: ctx.state.common.worktree_path.clone(),
                task: task.clone(),
                implementation_summary: data.last_summary.clone().unwrap_or_default(),
            })
            .await?;
        if let Some(usage) = &result.usage {
            ctx.sink.record_usage("reviewer", usage)?;
        }

        ctx.sink.emit(
            EventDraft::new(
                EventType::ReviewCompleted,
                "reviewer",
                format!("Review completed: {}", task.title),
            )
            .with_data(serde_json::json!({ data_keys::TASK: data.current_task })),
        )?;

        match result.verdict {
            ReviewVerdict::Approved => {
                ctx.sink.emit(
                    EventDraft::new(
                        EventType::TaskCompleted,
                        "reviewer",
                        format!("Task completed: {}", task.title),
                    )
                    .with_data(serde_json::json!({ data_keys::TASK: data.current_task })),
                )?;

                data.current_task += 1;
                data.review_iteration = 0;
                data.last_feedback = None;
                let done = data.current_task >= data.task_count();
                data.write(ctx.state)?;

                if done {
                    Ok(NodeTransition::Complete)
                } else {
                    Ok(NodeTransition::Next(stages::IMPLEMENTATION))
                }
            }
            ReviewVerdict::ChangesRequested { feedback } => {
                data.review_iteration += 1;

                if data.review_iteration >= data.max_review_iterations {
                    ctx.sink.emit(
                        EventDraft::new(
                            EventType::TaskFailed,
                            "reviewer",
                            format!(
                                "Task failed after {} review iterations: {}",
                                data.review_iteration, task.title
                            ),
                        )
                        .with_data(serde_json::json!({
                            data_keys::TASK: data.current_task,
                            data_keys::FEEDBACK: feedback,
                        })),
                    )?;
                    let iterations = data.max_review_iterations;
                    data.write(ctx.state)?;
                    return Err(EngineError::ReviewBudgetExhausted {
                        task: task.title,
                        iterations,
                    });
                }

                ctx.sink.emit(
                    EventDraft::new(
                        EventType::RevisionRequested,
                        "reviewer",
                        format!("Revision requested: {}", task.title),
                    )
                    .with_data(serde_json::json!({
                        data_keys::TASK: data.current_task,
                        data_keys::FEEDBACK: feedback.clone(),
                    })),
                )?;

                data.last_feedback = Some(feedback);
                data.write(ctx.state)?;
                Ok(NodeTransition::Next(stages::IMPLEMENTATION))
            }
        }
    }
}

#[cfg(test)]
#[path = "implementation_tests.rs"]
mod tests;
