//! Alarm and timer scheduling.
//!
//! Every alarm starts two delivery paths: a best-effort OS-level
//! scheduled notification and an in-process countdown task. Cancellation
//! never tears a countdown down early; it lands in one of two
//! registries (by normalized label, by `HH:MM`) that the worker checks
//! at fire time before making any noise. Alarm records are marked
//! cancelled but never removed, so a late ring check always has the
//! full history to consult.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AlertEvent;
use crate::error::{Result, ValetError};
use crate::normalize::safe_label;
use crate::platform::AlertSink;

/// One alarm as the user asked for it. Identity for cancellation is the
/// pair (normalized label, time of day).
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAlarm {
    pub label: String,
    pub time_of_day: String,
    pub created_at: DateTime<Local>,
    pub cancelled: bool,
}

/// A one-shot countdown request. Built per timer intent, never stored.
#[derive(Debug, Clone)]
pub struct TimerRequest {
    pub duration_seconds: u64,
    pub label: String,
    pub fire_at: DateTime<Local>,
}

impl TimerRequest {
    fn new(duration: Duration, label: &str) -> Result<Self> {
        let delta = chrono::Duration::from_std(duration)
            .map_err(|e| ValetError::System(format!("timer duration out of range: {e}")))?;
        Ok(Self {
            duration_seconds: duration.as_secs(),
            label: label.to_string(),
            fire_at: Local::now() + delta,
        })
    }
}

#[derive(Default)]
struct AlarmState {
    alarms: Vec<ScheduledAlarm>,
    cancelled_labels: HashSet<String>,
    cancelled_times: HashSet<String>,
}

impl AlarmState {
    /// Fire-time decision: a hit in either registry silences the
    /// countdown.
    fn is_cancelled(&self, label: &str, time_of_day: &str) -> bool {
        self.cancelled_labels.contains(&safe_label(label))
            || self.cancelled_times.contains(time_of_day)
    }
}

enum CountdownKind {
    Alarm,
    Timer,
}

/// Owns the alarm audit list and both cancellation registries, and
/// spawns the countdown workers.
pub struct AlarmService {
    sink: Arc<dyn AlertSink>,
    events: mpsc::UnboundedSender<AlertEvent>,
    state: Arc<Mutex<AlarmState>>,
}

impl AlarmService {
    #[must_use]
    pub fn new(sink: Arc<dyn AlertSink>, events: mpsc::UnboundedSender<AlertEvent>) -> Self {
        Self {
            sink,
            events,
            state: Arc::new(Mutex::new(AlarmState::default())),
        }
    }

    /// Schedule an alarm for the next occurrence of `time_of_day`
    /// (already normalized `HH:MM`).
    ///
    /// Re-creating an alarm clears any stale cancellation entries for
    /// the same label and time, so the new alarm rings even if an
    /// earlier namesake was cancelled.
    pub async fn schedule_alarm(&self, time_of_day: &str, label: &str) -> Result<String> {
        let (hour, minute) = parse_clock(time_of_day)?;
        let now = Local::now();
        let target = next_occurrence(now, hour, minute).ok_or_else(|| {
            ValetError::System(format!("cannot resolve a fire time for {time_of_day}"))
        })?;

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.cancelled_labels.remove(&safe_label(label));
            state.cancelled_times.remove(time_of_day);
            state.alarms.push(ScheduledAlarm {
                label: label.to_string(),
                time_of_day: time_of_day.to_string(),
                created_at: now,
                cancelled: false,
            });
        }

        // OS-level path is a bonus; the countdown below always runs.
        if let Err(e) = self.sink.schedule(label, time_of_day).await {
            debug!("no native scheduled notification for '{label}': {e}");
        }

        let wait = (target - now)
            .to_std()
            .unwrap_or_else(|_| Duration::from_secs(0));
        info!(
            "alarm '{label}' set for {} (in {}s)",
            target.format("%H:%M"),
            wait.as_secs()
        );
        self.spawn_countdown(
            wait,
            label.to_string(),
            time_of_day.to_string(),
            CountdownKind::Alarm,
        );
        Ok(format!("alarm '{label}' set for {}", target.format("%H:%M")))
    }

    /// Cancel by normalized label: registry insert, audit mark, then a
    /// best-effort removal of any OS-level notification of that id.
    pub async fn cancel_by_label(&self, label: &str) -> String {
        let id = safe_label(label);
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.cancelled_labels.insert(id.clone());
            for alarm in &mut state.alarms {
                if safe_label(&alarm.label) == id {
                    alarm.cancelled = true;
                }
            }
        }
        if let Err(e) = self.sink.cancel_by_id(&id).await {
            debug!("native cancel of '{id}' failed: {e}");
        }
        info!("alarm '{label}' cancelled");
        format!("alarm '{label}' cancelled")
    }

    /// Cancel every alarm firing at `time_of_day` (normalized `HH:MM`).
    pub async fn cancel_by_time(&self, time_of_day: &str) -> String {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.cancelled_times.insert(time_of_day.to_string());
            for alarm in &mut state.alarms {
                if alarm.time_of_day == time_of_day {
                    alarm.cancelled = true;
                }
            }
        }
        if let Err(e) = self.sink.cancel_at(time_of_day).await {
            debug!("native cancel at {time_of_day} failed: {e}");
        }
        info!("alarms at {time_of_day} cancelled");
        format!("alarms at {time_of_day} cancelled")
    }

    /// One-shot countdown with no OS-level counterpart. The fire-time
    /// registry check applies to timers too.
    pub fn start_timer(&self, duration: Duration, label: &str) -> Result<String> {
        let request = TimerRequest::new(duration, label)?;
        let fire_hhmm = request.fire_at.format("%H:%M").to_string();
        self.spawn_countdown(duration, request.label, fire_hhmm, CountdownKind::Timer);
        Ok(format!(
            "timer '{label}' set for {} seconds",
            request.duration_seconds
        ))
    }

    /// Snapshot of every alarm ever created this run, cancelled included.
    #[must_use]
    pub fn alarms(&self) -> Vec<ScheduledAlarm> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .alarms
            .clone()
    }

    fn spawn_countdown(
        &self,
        wait: Duration,
        label: String,
        time_of_day: String,
        kind: CountdownKind,
    ) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let suppressed = state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_cancelled(&label, &time_of_day);
            if suppressed {
                info!("'{label}' at {time_of_day} was cancelled, staying quiet");
                let _ = events.send(AlertEvent::Suppressed {
                    label,
                    time_of_day,
                });
                return;
            }
            let _ = events.send(match kind {
                CountdownKind::Alarm => AlertEvent::Fired {
                    label: label.clone(),
                    time_of_day: time_of_day.clone(),
                },
                CountdownKind::Timer => AlertEvent::TimerDone {
                    label: label.clone(),
                },
            });
            if let Err(e) = sink.ring_until_dismissed(&label).await {
                warn!("ring for '{label}' failed: {e}");
            }
        });
    }
}

/// Next wall-clock occurrence of `hour:minute` strictly after `now`
/// (same minute counts as passed and rolls to tomorrow).
pub(crate) fn next_occurrence(
    now: DateTime<Local>,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Local>> {
    let candidate = now
        .with_hour(hour)?
        .with_minute(minute)?
        .with_second(0)?
        .with_nanosecond(0)?;
    if candidate <= now {
        candidate.checked_add_signed(chrono::Duration::days(1))
    } else {
        Some(candidate)
    }
}

fn parse_clock(time_of_day: &str) -> Result<(u32, u32)> {
    let parsed = time_of_day.split_once(':').and_then(|(h, m)| {
        let hour: u32 = h.parse().ok()?;
        let minute: u32 = m.parse().ok()?;
        (hour < 24 && minute < 60).then_some((hour, minute))
    });
    parsed.ok_or_else(|| ValetError::System(format!("not a clock time: {time_of_day}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use chrono::TimeZone;
    use tokio::time::timeout;

    use super::*;
    use crate::platform::StubAlertSink;

    fn service() -> (
        AlarmService,
        Arc<StubAlertSink>,
        mpsc::UnboundedReceiver<AlertEvent>,
    ) {
        let sink = Arc::new(StubAlertSink::default());
        let (tx, rx) = mpsc::unbounded_channel();
        (AlarmService::new(sink.clone(), tx), sink, rx)
    }

    #[test]
    fn fire_decision_consults_both_registries() {
        let mut state = AlarmState::default();
        assert!(!state.is_cancelled("Wake Up", "07:30"));
        state.cancelled_labels.insert(safe_label("Wake Up"));
        assert!(state.is_cancelled("Wake Up", "09:00"));
        state.cancelled_times.insert("07:30".to_string());
        assert!(state.is_cancelled("Anything", "07:30"));
    }

    #[test]
    fn next_occurrence_rolls_to_tomorrow_when_passed() {
        let now = Local.with_ymd_and_hms(2026, 1, 15, 9, 1, 0).unwrap();
        let target = next_occurrence(now, 9, 0).unwrap();
        assert_eq!(target.format("%Y-%m-%d %H:%M").to_string(), "2026-01-16 09:00");
    }

    #[test]
    fn next_occurrence_stays_today_when_ahead() {
        let now = Local.with_ymd_and_hms(2026, 1, 15, 8, 59, 0).unwrap();
        let target = next_occurrence(now, 9, 0).unwrap();
        assert_eq!(target.format("%Y-%m-%d %H:%M").to_string(), "2026-01-15 09:00");
    }

    #[tokio::test]
    async fn schedule_records_alarm_and_tries_native_path() {
        let (service, sink, _rx) = service();
        let summary = service.schedule_alarm("07:30", "Wake").await.unwrap();
        assert!(summary.contains("07:30"));
        let alarms = service.alarms();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].label, "Wake");
        assert!(!alarms[0].cancelled);
        assert!(
            sink.calls()
                .iter()
                .any(|c| c.starts_with("schedule(Wake"))
        );
    }

    #[tokio::test]
    async fn cancel_by_label_marks_but_keeps_the_record() {
        let (service, sink, _rx) = service();
        service.schedule_alarm("07:30", "Wake Up").await.unwrap();
        service.cancel_by_label("Wake Up").await;
        let alarms = service.alarms();
        assert_eq!(alarms.len(), 1);
        assert!(alarms[0].cancelled);
        assert!(
            sink.calls()
                .iter()
                .any(|c| c == "cancel_by_id(Wake_Up)")
        );
    }

    #[tokio::test]
    async fn cancelled_timer_suppresses_instead_of_ringing() {
        let (service, sink, mut rx) = service();
        let label = "Tea";
        service
            .start_timer(Duration::from_millis(150), label)
            .unwrap();
        service.cancel_by_label(label).await;
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("countdown should finish")
            .expect("channel open");
        match event {
            AlertEvent::Suppressed { label: l, .. } => assert_eq!(l, "Tea"),
            other => panic!("expected suppression, got {other:?}"),
        }
        assert!(!sink.rang());
    }

    #[tokio::test]
    async fn live_timer_fires_and_rings() {
        let (service, sink, mut rx) = service();
        service
            .start_timer(Duration::from_millis(50), "Eggs")
            .unwrap();
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("countdown should finish")
            .expect("channel open");
        assert_eq!(
            event,
            AlertEvent::TimerDone {
                label: "Eggs".to_string()
            }
        );
        // The ring happens after the event; give it a moment.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.rang());
    }

    #[tokio::test]
    async fn recreating_a_cancelled_alarm_clears_the_registry() {
        let (service, _sink, mut rx) = service();
        service.cancel_by_label("Wake").await;
        service.cancel_by_time("07:30").await;
        service.schedule_alarm("07:30", "Wake").await.unwrap();
        // A fresh timer with the same identity must fire, not suppress.
        service
            .start_timer(Duration::from_millis(50), "Wake")
            .unwrap();
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("countdown should finish")
            .expect("channel open");
        assert_eq!(
            event,
            AlertEvent::TimerDone {
                label: "Wake".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cancel_by_time_suppresses_matching_countdown() {
        let (service, _sink, mut rx) = service();
        // The timer fires 150ms out, so its HH:MM is this minute or the
        // next one; cancelling both makes suppression certain.
        let now = Local::now();
        service
            .cancel_by_time(&now.format("%H:%M").to_string())
            .await;
        service
            .cancel_by_time(&(now + chrono::Duration::minutes(1)).format("%H:%M").to_string())
            .await;
        service.start_timer(Duration::from_millis(150), "Rice").unwrap();
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("countdown should finish")
            .expect("channel open");
        assert!(matches!(event, AlertEvent::Suppressed { .. }));
    }
}
