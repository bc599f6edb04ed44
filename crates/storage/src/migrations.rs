// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered SQL migrations, each applied once, tracked in `schema_version`.

use crate::db::StorageError;
use rusqlite::Connection;

/// Numbered migrations, applied in order. Append only: never edit or reorder
/// an entry that has shipped.
static MIGRATIONS: &[(u32, &str)] = &[(1, include_str!("migrations/0001_init.sql"))];

/// Apply any migrations newer than the recorded version.
///
/// Each migration runs inside its own transaction together with the version
/// bump, so a failure leaves the schema at the previous version.
pub(crate) fn apply(conn: &Connection) -> Result<u32, StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version       INTEGER PRIMARY KEY,
            applied_at_ms INTEGER NOT NULL
        )",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0u32;
    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = conn.execute_batch(sql).and_then(|_| {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at_ms) VALUES (?1, ?2)",
                rusqlite::params![version, now_ms as i64],
            )
            .map(|_| ())
        });
        match result {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
        }
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
#[path = "migrations_tests.rs"]
mod tests;
