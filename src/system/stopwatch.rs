//! Process-wide stopwatch.

use std::sync::Mutex;

use chrono::{DateTime, Local};

/// Single stopwatch origin behind a mutex. Starting while running
/// restarts the origin; stopping while idle is a reported no-op.
#[derive(Default)]
pub struct Stopwatch {
    started_at: Mutex<Option<DateTime<Local>>>,
}

impl Stopwatch {
    pub fn start(&self) {
        self.start_at(Local::now());
    }

    /// Elapsed time as `HH:MM:SS`, or `None` when not running. Clears
    /// the origin.
    pub fn stop(&self) -> Option<String> {
        self.stop_at(Local::now())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn start_at(&self, at: DateTime<Local>) {
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }

    fn stop_at(&self, at: DateTime<Local>) -> Option<String> {
        let started = self
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        let secs = u64::try_from((at - started).num_seconds()).unwrap_or(0);
        Some(format_elapsed(secs))
    }
}

/// `HH:MM:SS` rendering of a whole-second count.
#[must_use]
pub fn format_elapsed(total_secs: u64) -> String {
    let (mins, secs) = (total_secs / 60, total_secs % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    format!("{hours:02}:{mins:02}:{secs:02}")
}
