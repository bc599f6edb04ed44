// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::workflow::WorkflowId;
use proptest::prelude::*;

fn usage(model: &str, input: u64, output: u64, cache_read: u64, cache_write: u64) -> TokenUsage {
    TokenUsage {
        workflow_id: WorkflowId::from_string("wfl-t"),
        agent: "developer".to_string(),
        model: model.to_string(),
        input_tokens: input,
        output_tokens: output,
        cache_read_tokens: cache_read,
        cache_write_tokens: cache_write,
    }
}

#[test]
fn sonnet_cost_matches_hand_calculation() {
    // 1M fresh input at $3 + 1M output at $15
    let cost = calculate_cost(&usage("claude-sonnet-4-5", 1_000_000, 1_000_000, 0, 0));
    assert_eq!(cost, 18.0);
}

#[test]
fn cache_read_tokens_are_discounted() {
    // 1M input of which 1M cache-read: only the cache-read rate applies
    let cost = calculate_cost(&usage("claude-sonnet-4-5", 1_000_000, 0, 1_000_000, 0));
    assert_eq!(cost, 0.30);
}

#[test]
fn cache_write_priced_separately() {
    let cost = calculate_cost(&usage("claude-sonnet-4-5", 0, 0, 0, 1_000_000));
    assert_eq!(cost, 3.75);
}

#[test]
fn cache_read_above_input_saturates() {
    // Driver reported more cache reads than input; fresh input clamps at 0
    let cost = calculate_cost(&usage("claude-sonnet-4-5", 100, 0, 200, 0));
    assert!(cost >= 0.0);
}

#[test]
fn unknown_model_falls_back_to_default() {
    let known = calculate_cost(&usage(DEFAULT_MODEL, 500_000, 250_000, 0, 0));
    let unknown = calculate_cost(&usage("some-mystery-model", 500_000, 250_000, 0, 0));
    assert_eq!(known, unknown);
}

#[test]
fn dated_snapshot_prices_like_base_model() {
    let base = calculate_cost(&usage("claude-opus-4-1", 10_000, 10_000, 0, 0));
    let dated = calculate_cost(&usage("claude-opus-4-1-20250805", 10_000, 10_000, 0, 0));
    assert_eq!(base, dated);
}

#[test]
fn cost_is_rounded_to_six_decimals() {
    let cost = calculate_cost(&usage("claude-sonnet-4-5", 1, 1, 0, 0));
    let scaled = cost * 1_000_000.0;
    assert_eq!(scaled, scaled.round());
}

#[test]
fn totals_accumulate_counts_and_cost() {
    let mut totals = TokenTotals::default();
    totals.add(&usage("claude-sonnet-4-5", 1_000_000, 0, 0, 0));
    totals.add(&usage("claude-sonnet-4-5", 0, 1_000_000, 0, 0));
    assert_eq!(totals.input_tokens, 1_000_000);
    assert_eq!(totals.output_tokens, 1_000_000);
    assert_eq!(totals.cost_usd, 18.0);
}

// --- properties ---

proptest! {
    /// Cost is non-negative for all non-negative token counts.
    #[test]
    fn cost_nonnegative(
        input in 0u64..10_000_000,
        output in 0u64..10_000_000,
        cache_read in 0u64..10_000_000,
        cache_write in 0u64..10_000_000,
    ) {
        let cost = calculate_cost(&usage("claude-sonnet-4-5", input, output, cache_read, cache_write));
        prop_assert!(cost >= 0.0);
    }
}
