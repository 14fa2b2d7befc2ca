//! Platform collaborators for OS-level actions.
//!
//! Provides the [`DesktopControl`] trait for volume and power actions, the
//! [`AlertSink`] trait for OS-level notifications and the audible alarm
//! ring, and the [`LinkOpener`] trait for handing URLs and files to the
//! desktop. Command-backed implementations shell out to the host's own
//! tools under bounded timeouts; stub implementations record calls for
//! tests and unsupported hosts.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub mod command;
pub mod stub;

pub use command::{CommandAlertSink, CommandDesktopControl, DesktopLinkOpener};
pub use stub::{StubAlertSink, StubDesktopControl, StubLinkOpener};

/// Volume and power control for the host desktop.
///
/// Every call is best-effort: implementations bound their own external
/// calls and report failure as an error the engine logs without
/// propagating.
#[async_trait]
pub trait DesktopControl: Send + Sync {
    /// Raise output volume by `steps` key-step equivalents.
    async fn volume_up(&self, steps: u32) -> Result<()>;
    /// Lower output volume by `steps` key-step equivalents.
    async fn volume_down(&self, steps: u32) -> Result<()>;
    /// Mute audio output.
    async fn mute(&self) -> Result<()>;
    /// Restore audio output.
    async fn unmute(&self) -> Result<()>;
    /// Lock the interactive session.
    async fn lock_screen(&self) -> Result<()>;
    /// Suspend the machine.
    async fn sleep_now(&self) -> Result<()>;
    /// Blank or lock the display without suspending.
    async fn screen_off(&self) -> Result<()>;
}

/// OS-level scheduled notifications plus the audible alarm ring.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Schedule a native notification for the next occurrence of
    /// `time_of_day` (`HH:MM`). An error means the host has no native
    /// path and the in-process countdown is the sole mechanism.
    async fn schedule(&self, label: &str, time_of_day: &str) -> Result<()>;
    /// Remove a scheduled native notification by sanitized label.
    async fn cancel_by_id(&self, safe_label: &str) -> Result<()>;
    /// Remove scheduled native notifications firing at `time_of_day`.
    async fn cancel_at(&self, time_of_day: &str) -> Result<()>;
    /// Sound the alarm and block until the user acknowledges it.
    async fn ring_until_dismissed(&self, label: &str) -> Result<()>;
}

/// Hands a URL or local file to the desktop's default opener.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Open `target` (URL or path) with the default application.
    async fn open(&self, target: &str) -> Result<()>;
}

/// Create the command-backed desktop control for this host.
#[must_use]
pub fn create_desktop_control(timeout: Duration) -> std::sync::Arc<dyn DesktopControl> {
    std::sync::Arc::new(CommandDesktopControl::new(timeout))
}

/// Create the command-backed alert sink for this host.
#[must_use]
pub fn create_alert_sink(timeout: Duration) -> std::sync::Arc<dyn AlertSink> {
    std::sync::Arc::new(CommandAlertSink::new(timeout))
}

/// Create the default link opener.
#[must_use]
pub fn create_link_opener() -> std::sync::Arc<dyn LinkOpener> {
    std::sync::Arc::new(DesktopLinkOpener)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[tokio::test]
    async fn stub_desktop_control_records_calls() {
        let stub = StubDesktopControl::default();
        stub.mute().await.unwrap();
        stub.volume_up(3).await.unwrap();
        assert_eq!(stub.calls(), vec!["mute", "volume_up(3)"]);
    }

    #[tokio::test]
    async fn stub_alert_sink_records_calls() {
        let stub = StubAlertSink::with_native_schedule();
        stub.schedule("Standup", "09:00").await.unwrap();
        stub.cancel_by_id("Standup").await.unwrap();
        assert_eq!(
            stub.calls(),
            vec!["schedule(Standup,09:00)", "cancel_by_id(Standup)"]
        );
    }

    #[tokio::test]
    async fn default_stub_sink_has_no_native_schedule() {
        let stub = StubAlertSink::default();
        assert!(stub.schedule("Standup", "09:00").await.is_err());
        assert_eq!(stub.calls(), vec!["schedule(Standup,09:00)"]);
    }

    #[tokio::test]
    async fn stub_link_opener_records_targets() {
        let stub = StubLinkOpener::default();
        stub.open("https://example.com").await.unwrap();
        assert_eq!(stub.targets(), vec!["https://example.com"]);
    }

    #[test]
    fn factories_return_instances() {
        let _ = create_desktop_control(Duration::from_secs(1));
        let _ = create_alert_sink(Duration::from_secs(1));
        let _ = create_link_opener();
    }
}
