// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn builtin_registry_always_has_implementation() {
    let registry = PipelineRegistry::builtin();
    assert_eq!(registry.names(), vec!["implementation"]);
    assert_eq!(registry.get(None).unwrap().name(), "implementation");
    assert_eq!(registry.get(Some("implementation")).unwrap().name(), "implementation");
}

#[test]
fn unknown_pipeline_is_an_error() {
    let registry = PipelineRegistry::builtin();
    assert!(matches!(
        registry.get(Some("brainstorming")),
        Err(EngineError::UnknownPipeline(_))
    ));
}

#[test]
fn graph_exposes_entry_and_nodes() {
    let pipeline = PipelineRegistry::builtin().get(None).unwrap();
    let graph = pipeline.graph();
    assert_eq!(graph.entry(), "planning");
    assert!(graph.get("planning").is_some());
    assert!(graph.get("review").is_some());
    assert!(graph.get("missing").is_none());
    assert_eq!(graph.names(), vec!["implementation", "planning", "review", "validation"]);
}

#[test]
fn pipeline_state_roundtrips_through_json() {
    let state = PipelineState {
        common: CommonState {
            workflow_id: WorkflowId::from_string("wfl-1"),
            issue_id: "ISSUE-1".to_string(),
            worktree_path: "/w/a".into(),
            profile: Some("default".to_string()),
        },
        data: serde_json::json!({ "current_task": 2 }),
    };
    let json = serde_json::to_string(&state).unwrap();
    let parsed: PipelineState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, state);
}
