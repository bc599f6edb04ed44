// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline plug-in contract.
//!
//! A pipeline is a named graph of stages over a typed-in-JSON state. The
//! runner walks the graph: each node does its work through the stage driver,
//! then routes to the next node, parks at an approval gate, or completes.
//! Pipelines are discovered through a static registry; "implementation" is
//! always present.

pub mod implementation;

use crate::driver::{StageDriver, UsageReport};
use crate::error::EngineError;
use am_core::event::EventDraft;
use am_core::workflow::WorkflowId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Inputs a client supplies when starting a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowInputs {
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub worktree_name: String,
    pub profile: Option<String>,
    /// Supplied plan content; set, the pipeline skips its planning stage
    /// and goes straight to validation.
    pub external_plan: Option<String>,
    pub max_review_iterations: u32,
    /// Threaded from the originating request into emitted events
    pub correlation_id: Option<String>,
}

/// Fields every pipeline state shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonState {
    pub workflow_id: WorkflowId,
    pub issue_id: String,
    pub worktree_path: PathBuf,
    pub profile: Option<String>,
}

/// Runner-held state: the shared prefix plus the pipeline's private data,
/// kept as JSON so the blob persists opaquely between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub common: CommonState,
    pub data: serde_json::Value,
}

/// Where the graph goes after a node finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTransition {
    /// Continue with the named node
    Next(&'static str),
    /// Park at the named approval gate; resume at `resume` when granted
    Gate { gate: &'static str, resume: &'static str },
    /// The workflow is done
    Complete,
}

/// Emission surface handed to nodes: persisted events and usage records for
/// the node's workflow, without exposing the allocator.
pub trait EventSink: Send + Sync {
    fn emit(&self, draft: EventDraft) -> Result<(), EngineError>;
    fn record_usage(&self, agent: &str, usage: &UsageReport) -> Result<(), EngineError>;
}

/// Everything a node gets to work with.
pub struct NodeCtx<'a> {
    pub state: &'a mut PipelineState,
    pub driver: &'a dyn StageDriver,
    pub sink: &'a dyn EventSink,
}

/// A unit of pipeline work.
#[async_trait]
pub trait StageNode: Send + Sync {
    async fn run(&self, ctx: &mut NodeCtx<'_>) -> Result<NodeTransition, EngineError>;
}

/// Named nodes plus the default entry point.
pub struct StateGraph {
    entry: &'static str,
    nodes: HashMap<&'static str, Arc<dyn StageNode>>,
}

impl StateGraph {
    pub fn new(entry: &'static str) -> Self {
        Self { entry, nodes: HashMap::new() }
    }

    pub fn node(mut self, name: &'static str, node: impl StageNode + 'static) -> Self {
        self.nodes.insert(name, Arc::new(node));
        self
    }

    pub fn entry(&self) -> &'static str {
        self.entry
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StageNode>> {
        self.nodes.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.nodes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// A named workflow definition.
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// Build the pipeline-private part of the initial state.
    fn initial_state(&self, inputs: &WorkflowInputs) -> Result<serde_json::Value, EngineError>;

    /// The stage graph.
    fn graph(&self) -> StateGraph;

    /// Entry node for a fresh run of this state. Defaults to the graph's
    /// entry; pipelines override to route around stages the inputs already
    /// satisfy (an external plan skips planning).
    fn entry_for(&self, _state: &PipelineState) -> &'static str {
        self.graph().entry()
    }
}

/// Static name → pipeline registry.
#[derive(Clone)]
pub struct PipelineRegistry {
    pipelines: HashMap<&'static str, Arc<dyn Pipeline>>,
}

impl PipelineRegistry {
    /// Registry with the built-in pipelines.
    pub fn builtin() -> Self {
        let mut registry = Self { pipelines: HashMap::new() };
        registry.register(Arc::new(implementation::ImplementationPipeline));
        registry
    }

    pub fn register(&mut self, pipeline: Arc<dyn Pipeline>) {
        self.pipelines.insert(pipeline.name(), pipeline);
    }

    /// Resolve by name; `None` selects the default "implementation" pipeline.
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn Pipeline>, EngineError> {
        let name = name.unwrap_or(implementation::NAME);
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPipeline(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.pipelines.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
