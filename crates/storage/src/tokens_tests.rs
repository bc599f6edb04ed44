// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{insert_workflow, test_db};
use am_core::workflow::WorkflowId;

fn usage(input: u64, output: u64) -> TokenUsage {
    TokenUsage {
        workflow_id: WorkflowId::from_string("wfl-1"),
        agent: "developer".to_string(),
        model: "claude-sonnet-4-5".to_string(),
        input_tokens: input,
        output_tokens: output,
        cache_read_tokens: 0,
        cache_write_tokens: 0,
    }
}

#[test]
fn record_prices_the_row() {
    let (_dir, db) = test_db();
    insert_workflow(&db, "wfl-1", "/w/a");

    db.record_token_usage(&usage(1_000_000, 0), 1_500).unwrap();

    let rows = db.token_usage_rows("wfl-1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].cost_usd, 3.0);
    assert_eq!(rows[0].recorded_at_ms, 1_500);
}

#[test]
fn totals_sum_rows() {
    let (_dir, db) = test_db();
    insert_workflow(&db, "wfl-1", "/w/a");

    db.record_token_usage(&usage(1_000_000, 0), 1_500).unwrap();
    db.record_token_usage(&usage(0, 1_000_000), 1_600).unwrap();

    let totals = db.token_totals("wfl-1").unwrap();
    assert_eq!(totals.input_tokens, 1_000_000);
    assert_eq!(totals.output_tokens, 1_000_000);
    assert_eq!(totals.cost_usd, 18.0);
}

#[test]
fn totals_empty_workflow_is_zero() {
    let (_dir, db) = test_db();
    insert_workflow(&db, "wfl-1", "/w/a");
    assert_eq!(db.token_totals("wfl-1").unwrap(), am_core::TokenTotals::default());
}
