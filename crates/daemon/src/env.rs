// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::lifecycle::LifecycleError;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server version (from Cargo.toml)
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: AMELIA_STATE_DIR > XDG_STATE_HOME/amelia >
/// ~/.local/state/amelia
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("AMELIA_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("amelia"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/amelia"))
}

/// Listen address (default 127.0.0.1:7340, override `AMELIA_BIND`)
pub fn bind_addr() -> SocketAddr {
    std::env::var("AMELIA_BIND")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 7340)))
}

pub fn u64_var(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

pub fn usize_var(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Disable desktop notifications (`AMELIA_NO_NOTIFY=1`), for headless hosts.
pub fn notifications_disabled() -> bool {
    std::env::var("AMELIA_NO_NOTIFY").is_ok_and(|v| v == "1" || v == "true")
}
