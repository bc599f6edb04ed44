// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage accounting and cost arithmetic.
//!
//! Token counts are driver-reported; the core only prices them. Rates are
//! USD per million tokens, keyed by model id with a default-model fallback.

use crate::workflow::WorkflowId;
use serde::{Deserialize, Serialize};

/// One usage report from a stage driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub workflow_id: WorkflowId,
    pub agent: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

/// Aggregated usage across a workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
}

/// Per-model rates, USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
}

/// Model used for pricing when the reported id is unknown.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

static PRICING: &[(&str, ModelPricing)] = &[
    (
        "claude-sonnet-4-5",
        ModelPricing { input: 3.0, output: 15.0, cache_read: 0.30, cache_write: 3.75 },
    ),
    (
        "claude-opus-4-1",
        ModelPricing { input: 15.0, output: 75.0, cache_read: 1.50, cache_write: 18.75 },
    ),
    (
        "claude-haiku-4-5",
        ModelPricing { input: 1.0, output: 5.0, cache_read: 0.10, cache_write: 1.25 },
    ),
];

/// Look up rates for a model id, falling back to [`DEFAULT_MODEL`].
///
/// Matches on prefix so dated snapshots ("claude-sonnet-4-5-20250929")
/// price like their base model.
pub fn pricing_for(model: &str) -> ModelPricing {
    PRICING
        .iter()
        .find(|(id, _)| model == *id || model.starts_with(*id))
        .or_else(|| PRICING.iter().find(|(id, _)| *id == DEFAULT_MODEL))
        .map(|(_, p)| *p)
        .unwrap_or(ModelPricing { input: 0.0, output: 0.0, cache_read: 0.0, cache_write: 0.0 })
}

/// Price a usage report in USD, rounded to six decimals.
///
/// Cache-read tokens are billed at the cache-read rate instead of the input
/// rate, so they are subtracted from the input count first (saturating:
/// drivers occasionally report cache reads above input).
pub fn calculate_cost(usage: &TokenUsage) -> f64 {
    let rates = pricing_for(&usage.model);
    let fresh_input = usage.input_tokens.saturating_sub(usage.cache_read_tokens);

    let cost = per_million(fresh_input, rates.input)
        + per_million(usage.cache_read_tokens, rates.cache_read)
        + per_million(usage.cache_write_tokens, rates.cache_write)
        + per_million(usage.output_tokens, rates.output);

    (cost * 1_000_000.0).round() / 1_000_000.0
}

fn per_million(tokens: u64, rate: f64) -> f64 {
    tokens as f64 / 1_000_000.0 * rate
}

impl TokenTotals {
    /// Fold one usage report into the totals.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        self.cache_write_tokens += usage.cache_write_tokens;
        self.cost_usd = ((self.cost_usd + calculate_cost(usage)) * 1_000_000.0).round()
            / 1_000_000.0;
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
