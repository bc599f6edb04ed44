// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage rows and per-workflow summaries.

use crate::db::{Database, StorageError};
use am_core::tokens::{calculate_cost, TokenTotals, TokenUsage};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

/// A priced usage row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageRow {
    pub agent: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost_usd: f64,
    pub recorded_at_ms: u64,
}

impl Database {
    /// Price and record one driver-reported usage.
    pub fn record_token_usage(&self, usage: &TokenUsage, now_ms: u64) -> Result<(), StorageError> {
        let cost = calculate_cost(usage);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO token_usage (workflow_id, agent, model, input_tokens, output_tokens, \
             cache_read_tokens, cache_write_tokens, cost_usd, recorded_at_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                usage.workflow_id.as_str(),
                usage.agent,
                usage.model,
                usage.input_tokens as i64,
                usage.output_tokens as i64,
                usage.cache_read_tokens as i64,
                usage.cache_write_tokens as i64,
                cost,
                now_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// All usage rows for a workflow in recording order.
    pub fn token_usage_rows(&self, workflow_id: &str) -> Result<Vec<TokenUsageRow>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT agent, model, input_tokens, output_tokens, cache_read_tokens, \
             cache_write_tokens, cost_usd, recorded_at_ms \
             FROM token_usage WHERE workflow_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![workflow_id], row_to_usage)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Aggregate counts and cost for a workflow.
    pub fn token_totals(&self, workflow_id: &str) -> Result<TokenTotals, StorageError> {
        let conn = self.conn.lock();
        let totals = conn.query_row(
            "SELECT COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0), \
             COALESCE(SUM(cache_read_tokens), 0), COALESCE(SUM(cache_write_tokens), 0), \
             COALESCE(SUM(cost_usd), 0.0) \
             FROM token_usage WHERE workflow_id = ?1",
            params![workflow_id],
            |row| {
                Ok(TokenTotals {
                    input_tokens: row.get::<_, i64>(0)? as u64,
                    output_tokens: row.get::<_, i64>(1)? as u64,
                    cache_read_tokens: row.get::<_, i64>(2)? as u64,
                    cache_write_tokens: row.get::<_, i64>(3)? as u64,
                    cost_usd: row.get(4)?,
                })
            },
        )?;
        Ok(totals)
    }
}

fn row_to_usage(row: &Row<'_>) -> Result<TokenUsageRow, rusqlite::Error> {
    Ok(TokenUsageRow {
        agent: row.get(0)?,
        model: row.get(1)?,
        input_tokens: row.get::<_, i64>(2)? as u64,
        output_tokens: row.get::<_, i64>(3)? as u64,
        cache_read_tokens: row.get::<_, i64>(4)? as u64,
        cache_write_tokens: row.get::<_, i64>(5)? as u64,
        cost_usd: row.get(6)?,
        recorded_at_ms: row.get::<_, i64>(7)? as u64,
    })
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
