// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read/write probes backing the health endpoints.

use crate::db::{Database, StorageError};
use rusqlite::params;

impl Database {
    /// Verify the database accepts writes by upserting the probe row.
    pub fn write_probe(&self, now_ms: u64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO health_check (id, probed_at_ms) VALUES (1, ?1) \
             ON CONFLICT(id) DO UPDATE SET probed_at_ms = excluded.probed_at_ms",
            params![now_ms as i64],
        )?;
        Ok(())
    }

    /// Verify the database answers reads.
    pub fn read_probe(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let _: i64 = conn.query_row("SELECT COUNT(*) FROM workflows", [], |row| row.get(0))?;
        Ok(())
    }
}
