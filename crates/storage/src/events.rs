// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event rows.

use crate::db::{Database, StorageError};
use am_core::event::{EventId, EventType, WorkflowEvent};
use am_core::workflow::WorkflowId;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use std::str::FromStr;

const COLUMNS: &str =
    "id, workflow_id, sequence, timestamp_ms, agent, event_type, message, data, correlation_id";

impl Database {
    /// Append one event.
    ///
    /// Uses an IMMEDIATE transaction so concurrent writers conflict at
    /// acquisition rather than commit. A `(workflow_id, sequence)` collision
    /// means the sequence allocator misbehaved and is returned as
    /// [`StorageError::DuplicateSequence`], fatal to that workflow's task.
    pub fn append_event(&self, event: &WorkflowEvent) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let data = match &event.data {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        let result = tx.execute(
            "INSERT INTO events (id, workflow_id, sequence, timestamp_ms, agent, event_type, \
             message, data, correlation_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id.as_str(),
                event.workflow_id.as_str(),
                event.sequence as i64,
                event.timestamp_ms as i64,
                event.agent,
                event.event_type.to_string(),
                event.message,
                data,
                event.correlation_id,
            ],
        );

        match result {
            Ok(_) => {
                tx.commit()?;
                Ok(())
            }
            Err(e) if is_sequence_collision(&e) => Err(StorageError::DuplicateSequence {
                workflow_id: event.workflow_id,
                sequence: event.sequence,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Events for one workflow ordered by sequence, optionally only those
    /// after `since_sequence`.
    pub fn events_for(
        &self,
        workflow_id: &str,
        since_sequence: Option<u64>,
    ) -> Result<Vec<WorkflowEvent>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM events \
             WHERE workflow_id = ?1 AND sequence > ?2 ORDER BY sequence"
        ))?;
        let rows = stmt.query_map(
            params![workflow_id, since_sequence.unwrap_or(0) as i64],
            row_to_event,
        )?;
        collect(rows)
    }

    /// The most recent `limit` events for a workflow, oldest of them first.
    pub fn recent_events(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowEvent>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM (SELECT {COLUMNS} FROM events WHERE workflow_id = ?1 \
             ORDER BY sequence DESC LIMIT ?2) ORDER BY sequence"
        ))?;
        let rows = stmt.query_map(params![workflow_id, limit as i64], row_to_event)?;
        collect(rows)
    }

    /// Highest sequence for a workflow, 0 when it has no events.
    pub fn max_sequence(&self, workflow_id: &str) -> Result<u64, StorageError> {
        let conn = self.conn.lock();
        let max: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) FROM events WHERE workflow_id = ?1",
            params![workflow_id],
            |row| row.get(0),
        )?;
        Ok(max as u64)
    }

    pub fn event_exists(&self, event_id: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM events WHERE id = ?1", params![event_id], |row| row.get(0))
            .optional()?;
        Ok(exists.is_some())
    }

    /// All events inserted after the given event, across workflows, in
    /// insertion order. Used for WebSocket reconnect backfill; the caller
    /// filters by subscription. Returns `None` when the anchor event is no
    /// longer present (pruned by retention); backfill has expired.
    pub fn events_after(
        &self,
        event_id: &str,
    ) -> Result<Option<Vec<WorkflowEvent>>, StorageError> {
        let conn = self.conn.lock();
        let anchor: Option<i64> = conn
            .query_row("SELECT rowid FROM events WHERE id = ?1", params![event_id], |row| {
                row.get(0)
            })
            .optional()?;
        let anchor = match anchor {
            Some(rowid) => rowid,
            None => return Ok(None),
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM events WHERE rowid > ?1 ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(params![anchor], row_to_event)?;
        collect(rows).map(Some)
    }
}

fn is_sequence_collision(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(message))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && message.contains("events.workflow_id")
    )
}

fn collect(
    rows: impl Iterator<Item = Result<WorkflowEvent, rusqlite::Error>>,
) -> Result<Vec<WorkflowEvent>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_event(row: &Row<'_>) -> Result<WorkflowEvent, rusqlite::Error> {
    let id: String = row.get(0)?;
    let workflow_id: String = row.get(1)?;
    let event_type: String = row.get(5)?;
    let event_type = EventType::from_str(&event_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    let data: Option<String> = row.get(7)?;
    let data = match data {
        Some(text) => Some(serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?),
        None => None,
    };

    Ok(WorkflowEvent {
        id: EventId::from_string(id),
        workflow_id: WorkflowId::from_string(workflow_id),
        sequence: row.get::<_, i64>(2)? as u64,
        timestamp_ms: row.get::<_, i64>(3)? as u64,
        agent: row.get(4)?,
        event_type,
        message: row.get(6)?,
        data,
        correlation_id: row.get(8)?,
    })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
