// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque keyset-pagination cursor over `(started_at_ms, id)`.

use crate::db::StorageError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Position of the last row the client saw, descending order.
///
/// `started_at_ms` is 0 for workflows that have not emitted
/// `workflow_started` yet, which sorts them after everything that has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub started_at_ms: u64,
    pub id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.started_at_ms, self.id))
    }

    pub fn decode(raw: &str) -> Result<Self, StorageError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| StorageError::BadCursor(e.to_string()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| StorageError::BadCursor("not utf-8".to_string()))?;
        let (ms, id) = text
            .split_once(':')
            .ok_or_else(|| StorageError::BadCursor("missing separator".to_string()))?;
        let started_at_ms: u64 =
            ms.parse().map_err(|_| StorageError::BadCursor("bad timestamp".to_string()))?;
        if id.is_empty() {
            return Err(StorageError::BadCursor("empty id".to_string()));
        }
        Ok(Self { started_at_ms, id: id.to_string() })
    }
}

#[cfg(test)]
#[path = "cursor_tests.rs"]
mod tests;
