// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desktop notification adapter.
//!
//! Approval gates and terminal failures surface as desktop notifications so
//! a human notices a parked workflow without watching the UI. Delivery is
//! strictly best-effort.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-support"))]
use std::sync::Arc;

/// Sends user-facing notifications.
#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Notification Center / libnotify adapter via notify-rust.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotify;

impl DesktopNotify {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            // Pre-set the application bundle identifier so mac-notification-sys
            // skips its NSAppleScript lookup (which blocks forever in daemon
            // processes that lack Automation permissions).
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }
}

#[async_trait]
impl NotifyAdapter for DesktopNotify {
    async fn notify(&self, title: &str, message: &str) {
        let title = title.to_string();
        let message = message.to_string();
        // Notification::show() is synchronous; run it on the blocking pool.
        tokio::task::spawn_blocking(move || {
            if let Err(e) =
                notify_rust::Notification::new().summary(&title).body(&message).show()
            {
                tracing::warn!(error = %e, "desktop notification failed");
            }
        });
    }
}

/// Adapter that drops every notification (headless and CI runs).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotify;

#[async_trait]
impl NotifyAdapter for NoopNotify {
    async fn notify(&self, _title: &str, _message: &str) {}
}

/// Records notifications for assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeNotify {
    sent: Arc<parking_lot::Mutex<Vec<(String, String)>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeNotify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl NotifyAdapter for FakeNotify {
    async fn notify(&self, title: &str, message: &str) {
        self.sent.lock().push((title.to_string(), message.to_string()));
    }
}
