//! System actions: volume, power, alarms, timers, stopwatch.
//!
//! Free text after the `system ` prefix runs through an ordered
//! recognizer chain; the first category that matches wins. The same
//! categorization drives the dispatch priority, so "mute" always
//! outranks "lock" no matter how the user ordered the batch.

pub mod alarm;
pub mod stopwatch;

pub use alarm::{AlarmService, ScheduledAlarm, TimerRequest};
pub use stopwatch::Stopwatch;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::SystemConfig;
use crate::error::{Result, ValetError};
use crate::normalize::{clock_token, is_duration_token, normalize_time_tokens, parse_duration_secs};
use crate::platform::{AlertSink, DesktopControl};

/// Notifications surfaced by countdown workers and the stopwatch,
/// rendered by the host however it likes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Fired { label: String, time_of_day: String },
    Suppressed { label: String, time_of_day: String },
    TimerDone { label: String },
    StopwatchReport { elapsed: String },
}

const VOLUME_UP_WORDS: &[&str] = &["up", "increase", "raise", "louder", "higher"];
const VOLUME_DOWN_WORDS: &[&str] = &["down", "decrease", "lower", "quieter"];

/// Recognized command families, in recognition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemCategory {
    AlarmCancel,
    Unmute,
    Mute,
    VolumeUp,
    VolumeDown,
    Lock,
    Sleep,
    ScreenOff,
    AlarmCreate,
    Timer,
    Stopwatch,
    Unknown,
}

/// First-match classification of a lowercased system command.
fn categorize(command: &str) -> SystemCategory {
    let has_word = |w: &str| command.split_whitespace().any(|t| t == w);
    if command.starts_with("alarm delete")
        || command.starts_with("delete alarm")
        || command.starts_with("delete task")
    {
        SystemCategory::AlarmCancel
    } else if has_word("unmute") {
        SystemCategory::Unmute
    } else if has_word("mute") {
        SystemCategory::Mute
    } else if VOLUME_UP_WORDS.iter().any(|w| has_word(w)) {
        SystemCategory::VolumeUp
    } else if VOLUME_DOWN_WORDS.iter().any(|w| has_word(w)) {
        SystemCategory::VolumeDown
    } else if command == "volume" {
        SystemCategory::VolumeUp
    } else if has_word("lock") {
        SystemCategory::Lock
    } else if has_word("sleep") {
        SystemCategory::Sleep
    } else if command.contains("screen off")
        || command.contains("turn off screen")
        || command.contains("display off")
    {
        SystemCategory::ScreenOff
    } else if has_word("alarm") {
        SystemCategory::AlarmCreate
    } else if command.starts_with("timer ") {
        SystemCategory::Timer
    } else if command.starts_with("stopwatch") {
        SystemCategory::Stopwatch
    } else {
        SystemCategory::Unknown
    }
}

/// Start-order rank for a system command; lower starts earlier.
///
/// Audio tweaks go first so a "mute and lock" batch is silent before
/// the screen locks; alarm bookkeeping runs after power actions;
/// timers and the stopwatch keep input order at the back.
#[must_use]
pub fn priority(command: &str) -> u8 {
    match categorize(&command.trim().to_lowercase()) {
        SystemCategory::Unmute
        | SystemCategory::Mute
        | SystemCategory::VolumeUp
        | SystemCategory::VolumeDown => 1,
        SystemCategory::ScreenOff => 2,
        SystemCategory::Lock => 3,
        SystemCategory::Sleep => 4,
        SystemCategory::AlarmCancel | SystemCategory::AlarmCreate => 5,
        SystemCategory::Timer | SystemCategory::Stopwatch | SystemCategory::Unknown => 9,
    }
}

/// Executes `system ...` commands against the desktop and the alarm
/// and stopwatch services.
pub struct SystemEngine {
    desktop: Arc<dyn DesktopControl>,
    alarms: AlarmService,
    stopwatch: Stopwatch,
    events: mpsc::UnboundedSender<AlertEvent>,
    volume_repeat: u32,
}

impl SystemEngine {
    #[must_use]
    pub fn new(
        desktop: Arc<dyn DesktopControl>,
        sink: Arc<dyn AlertSink>,
        events: mpsc::UnboundedSender<AlertEvent>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            desktop,
            alarms: AlarmService::new(sink, events.clone()),
            stopwatch: Stopwatch::default(),
            events,
            volume_repeat: config.volume_repeat,
        }
    }

    /// Every alarm created this run, for status listings.
    #[must_use]
    pub fn alarms(&self) -> Vec<ScheduledAlarm> {
        self.alarms.alarms()
    }

    /// Run one system command. `Ok` carries a human-readable summary;
    /// `Err` carries the reason, including usage hints for malformed
    /// alarm, timer and stopwatch syntax.
    pub async fn handle(&self, text: &str) -> Result<String> {
        let raw = text.trim();
        let command = raw.to_lowercase();
        info!("system command: '{command}'");
        match categorize(&command) {
            SystemCategory::AlarmCancel => Ok(self.cancel_alarm(raw).await),
            SystemCategory::Unmute => {
                if let Err(e) = self.desktop.unmute().await {
                    warn!("unmute failed: {e}");
                }
                Ok("unmuted".to_string())
            }
            SystemCategory::Mute => {
                if let Err(e) = self.desktop.mute().await {
                    warn!("mute failed: {e}");
                }
                Ok("muted".to_string())
            }
            SystemCategory::VolumeUp => {
                if command == "volume" {
                    info!("no direction given, raising volume by default");
                }
                if let Err(e) = self.desktop.volume_up(self.volume_repeat).await {
                    warn!("volume up failed: {e}");
                }
                Ok("volume raised".to_string())
            }
            SystemCategory::VolumeDown => {
                if let Err(e) = self.desktop.volume_down(self.volume_repeat).await {
                    warn!("volume down failed: {e}");
                }
                Ok("volume lowered".to_string())
            }
            SystemCategory::Lock => {
                if let Err(e) = self.desktop.lock_screen().await {
                    warn!("lock failed: {e}");
                }
                Ok("screen locked".to_string())
            }
            SystemCategory::Sleep => {
                if let Err(e) = self.desktop.sleep_now().await {
                    warn!("sleep failed: {e}");
                }
                Ok("going to sleep".to_string())
            }
            SystemCategory::ScreenOff => {
                if let Err(e) = self.desktop.screen_off().await {
                    warn!("screen off failed: {e}");
                }
                Ok("screen off".to_string())
            }
            SystemCategory::AlarmCreate => self.create_alarm(raw).await,
            SystemCategory::Timer => self.start_timer(&command),
            SystemCategory::Stopwatch => self.run_stopwatch(&command),
            SystemCategory::Unknown => {
                warn!("no system action matches '{raw}'");
                Err(ValetError::System(format!(
                    "no system action matches '{raw}'"
                )))
            }
        }
    }

    /// `alarm delete ...` / `delete alarm ...` / `delete task ...`:
    /// whatever is left after the keywords is either a clock time
    /// (cancel the whole minute) or a label.
    async fn cancel_alarm(&self, raw: &str) -> String {
        let tail: Vec<&str> = raw
            .split_whitespace()
            .filter(|p| !matches!(p.to_lowercase().as_str(), "alarm" | "delete" | "at"))
            .collect();
        if let Some(hhmm) = normalize_time_tokens(&tail) {
            self.alarms.cancel_by_time(&hhmm).await
        } else {
            let label = tail.join(" ");
            let label = if label.trim().is_empty() {
                "Alarm"
            } else {
                label.trim()
            };
            self.alarms.cancel_by_label(label).await
        }
    }

    /// `alarm HH:MM <label>`: the first colon-delimited all-digits
    /// token is the time, the rest the label.
    async fn create_alarm(&self, raw: &str) -> Result<String> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        for (i, part) in parts.iter().enumerate() {
            if let Some(hhmm) = clock_token(part) {
                let rest = parts[i + 1..].join(" ");
                let label = if rest.trim().is_empty() {
                    "Alarm"
                } else {
                    rest.trim()
                };
                return self.alarms.schedule_alarm(&hhmm, label).await;
            }
        }
        Err(ValetError::Parse(
            "usage: system alarm HH:MM <label>".to_string(),
        ))
    }

    /// `timer <duration-expr> <label?>`: duration tokens sum, the
    /// leftover words become the label.
    fn start_timer(&self, command: &str) -> Result<String> {
        let text = command.strip_prefix("timer ").unwrap_or(command).trim();
        if text.is_empty() {
            return Err(ValetError::Parse(
                "usage: system timer <duration> <label>".to_string(),
            ));
        }
        let secs = parse_duration_secs(text);
        let words: Vec<&str> = text
            .split_whitespace()
            .filter(|w| !is_duration_token(w))
            .collect();
        let label = if words.is_empty() {
            "Timer".to_string()
        } else {
            title_case(&words.join(" "))
        };
        self.alarms.start_timer(Duration::from_secs(secs), &label)
    }

    fn run_stopwatch(&self, command: &str) -> Result<String> {
        // Match against the remainder only: "stopwatch" itself contains
        // "stop", so a whole-command substring check could never reach
        // the usage hint.
        let rest = command.strip_prefix("stopwatch").unwrap_or(command).trim();
        if rest.contains("start") {
            self.stopwatch.start();
            Ok("stopwatch started".to_string())
        } else if rest.contains("stop") {
            match self.stopwatch.stop() {
                Some(elapsed) => {
                    let _ = self.events.send(AlertEvent::StopwatchReport {
                        elapsed: elapsed.clone(),
                    });
                    Ok(format!("elapsed {elapsed}"))
                }
                None => Ok("stopwatch is not running".to_string()),
            }
        } else {
            Err(ValetError::Parse(
                "usage: system stopwatch start | system stopwatch stop".to_string(),
            ))
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
