//! Recording stubs for tests and unsupported hosts.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{AlertSink, DesktopControl, LinkOpener};
use crate::error::Result;

/// Desktop control that records each call instead of touching the host.
#[derive(Default)]
pub struct StubDesktopControl {
    calls: Mutex<Vec<String>>,
}

impl StubDesktopControl {
    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl DesktopControl for StubDesktopControl {
    async fn volume_up(&self, steps: u32) -> Result<()> {
        self.record(format!("volume_up({steps})"));
        Ok(())
    }

    async fn volume_down(&self, steps: u32) -> Result<()> {
        self.record(format!("volume_down({steps})"));
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        self.record("mute".to_string());
        Ok(())
    }

    async fn unmute(&self) -> Result<()> {
        self.record("unmute".to_string());
        Ok(())
    }

    async fn lock_screen(&self) -> Result<()> {
        self.record("lock_screen".to_string());
        Ok(())
    }

    async fn sleep_now(&self) -> Result<()> {
        self.record("sleep_now".to_string());
        Ok(())
    }

    async fn screen_off(&self) -> Result<()> {
        self.record("screen_off".to_string());
        Ok(())
    }
}

/// Alert sink that records calls; `schedule` reports no native path by
/// default so the in-process countdown always runs in tests.
#[derive(Default)]
pub struct StubAlertSink {
    calls: Mutex<Vec<String>>,
    schedule_available: bool,
}

impl StubAlertSink {
    /// A stub whose `schedule` succeeds, for exercising the native path.
    #[must_use]
    pub fn with_native_schedule() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            schedule_available: true,
        }
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True if the ring hook was ever invoked.
    #[must_use]
    pub fn rang(&self) -> bool {
        self.calls()
            .iter()
            .any(|c| c.starts_with("ring_until_dismissed"))
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl AlertSink for StubAlertSink {
    async fn schedule(&self, label: &str, time_of_day: &str) -> Result<()> {
        self.record(format!("schedule({label},{time_of_day})"));
        if self.schedule_available {
            Ok(())
        } else {
            Err(crate::error::ValetError::Platform(
                "no native scheduled notifications on this host".to_string(),
            ))
        }
    }

    async fn cancel_by_id(&self, safe_label: &str) -> Result<()> {
        self.record(format!("cancel_by_id({safe_label})"));
        Ok(())
    }

    async fn cancel_at(&self, time_of_day: &str) -> Result<()> {
        self.record(format!("cancel_at({time_of_day})"));
        Ok(())
    }

    async fn ring_until_dismissed(&self, label: &str) -> Result<()> {
        self.record(format!("ring_until_dismissed({label})"));
        Ok(())
    }
}

/// Link opener that records targets instead of opening them.
#[derive(Default)]
pub struct StubLinkOpener {
    targets: Mutex<Vec<String>>,
}

impl StubLinkOpener {
    /// Targets opened so far, in order.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl LinkOpener for StubLinkOpener {
    async fn open(&self, target: &str) -> Result<()> {
        self.targets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(target.to_string());
        Ok(())
    }
}
