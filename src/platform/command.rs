//! Command-backed platform control.
//!
//! Shells out to the host's own tooling: `pactl`, `loginctl` and
//! `systemctl` on Linux, `osascript` and `pmset` on macOS, `rundll32`
//! and PowerShell on Windows. Every invocation runs under a bounded
//! timeout so a wedged helper cannot stall dispatch.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AlertSink, DesktopControl, LinkOpener};
use crate::error::{Result, ValetError};

/// Run `program` with `args`, no shell, bounded by `timeout`.
///
/// The child is killed if the timeout elapses. A non-zero exit status
/// is an error carrying the tail of stderr.
pub(crate) async fn run_command(timeout: Duration, program: &str, args: &[&str]) -> Result<String> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ValetError::Platform(format!("failed to spawn {program}: {e}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            ValetError::Platform(format!("{program} timed out after {}s", timeout.as_secs()))
        })?
        .map_err(|e| ValetError::Platform(format!("{program} failed: {e}")))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ValetError::Platform(format!(
            "{program} exited with code {code}: {}",
            stderr.trim()
        )))
    }
}

/// Strip quote characters from text that gets embedded in an
/// `osascript` or PowerShell one-liner.
fn script_safe(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\'' | '"' | '`')).collect()
}

/// Desktop control backed by the host's command-line tools.
pub struct CommandDesktopControl {
    timeout: Duration,
}

impl CommandDesktopControl {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        run_command(self.timeout, program, args).await.map(|_| ())
    }

    /// One volume step in the given direction.
    async fn volume_step(&self, up: bool) -> Result<()> {
        if cfg!(target_os = "linux") {
            let delta = if up { "+5%" } else { "-5%" };
            self.run("pactl", &["set-sink-volume", "@DEFAULT_SINK@", delta])
                .await
        } else if cfg!(target_os = "macos") {
            let delta = if up { "+ 6" } else { "- 6" };
            let script = format!(
                "set volume output volume ((output volume of (get volume settings)) {delta})"
            );
            self.run("osascript", &["-e", &script]).await
        } else if cfg!(target_os = "windows") {
            // Virtual-key presses: 175 is volume-up, 174 volume-down.
            let key = if up { 175 } else { 174 };
            let script = format!("(New-Object -ComObject WScript.Shell).SendKeys([char]{key})");
            self.run("powershell", &["-NoProfile", "-Command", &script])
                .await
        } else {
            Err(ValetError::Platform(
                "volume control is not supported on this host".into(),
            ))
        }
    }
}

#[async_trait]
impl DesktopControl for CommandDesktopControl {
    async fn volume_up(&self, steps: u32) -> Result<()> {
        for _ in 0..steps.max(1) {
            self.volume_step(true).await?;
        }
        Ok(())
    }

    async fn volume_down(&self, steps: u32) -> Result<()> {
        for _ in 0..steps.max(1) {
            self.volume_step(false).await?;
        }
        Ok(())
    }

    async fn mute(&self) -> Result<()> {
        if cfg!(target_os = "linux") {
            self.run("pactl", &["set-sink-mute", "@DEFAULT_SINK@", "1"])
                .await
        } else if cfg!(target_os = "macos") {
            self.run("osascript", &["-e", "set volume output muted true"])
                .await
        } else if cfg!(target_os = "windows") {
            // The mute key toggles, so nudge the volume first to force an
            // unmuted state and land on muted deterministically.
            let script =
                "$w = New-Object -ComObject WScript.Shell; $w.SendKeys([char]175); $w.SendKeys([char]173)";
            self.run("powershell", &["-NoProfile", "-Command", script])
                .await
        } else {
            Err(ValetError::Platform(
                "mute is not supported on this host".into(),
            ))
        }
    }

    async fn unmute(&self) -> Result<()> {
        if cfg!(target_os = "linux") {
            self.run("pactl", &["set-sink-mute", "@DEFAULT_SINK@", "0"])
                .await
        } else if cfg!(target_os = "macos") {
            self.run("osascript", &["-e", "set volume output muted false"])
                .await
        } else if cfg!(target_os = "windows") {
            // Any volume key clears the mute flag; down-then-up keeps the
            // level roughly where it was.
            let script =
                "$w = New-Object -ComObject WScript.Shell; $w.SendKeys([char]174); $w.SendKeys([char]175)";
            self.run("powershell", &["-NoProfile", "-Command", script])
                .await
        } else {
            Err(ValetError::Platform(
                "unmute is not supported on this host".into(),
            ))
        }
    }

    async fn lock_screen(&self) -> Result<()> {
        if cfg!(target_os = "linux") {
            self.run("loginctl", &["lock-session"]).await
        } else if cfg!(target_os = "macos") {
            self.run("pmset", &["displaysleepnow"]).await
        } else if cfg!(target_os = "windows") {
            self.run("rundll32.exe", &["user32.dll,LockWorkStation"])
                .await
        } else {
            Err(ValetError::Platform(
                "screen lock is not supported on this host".into(),
            ))
        }
    }

    async fn sleep_now(&self) -> Result<()> {
        if cfg!(target_os = "linux") {
            self.run("systemctl", &["suspend"]).await
        } else if cfg!(target_os = "macos") {
            self.run("pmset", &["sleepnow"]).await
        } else if cfg!(target_os = "windows") {
            // Locking is the closest safe equivalent without powercfg
            // tinkering; suspend on Windows needs hibernation disabled.
            self.run("rundll32.exe", &["user32.dll,LockWorkStation"])
                .await
        } else {
            Err(ValetError::Platform(
                "sleep is not supported on this host".into(),
            ))
        }
    }

    async fn screen_off(&self) -> Result<()> {
        if cfg!(target_os = "linux") {
            self.run("loginctl", &["lock-session"]).await
        } else if cfg!(target_os = "macos") {
            self.run("pmset", &["displaysleepnow"]).await
        } else if cfg!(target_os = "windows") {
            self.run("rundll32.exe", &["user32.dll,LockWorkStation"])
                .await
        } else {
            Err(ValetError::Platform(
                "screen off is not supported on this host".into(),
            ))
        }
    }
}

/// Alert sink backed by the host's notification tooling.
///
/// Only Windows offers a native scheduled-notification path (BurntToast
/// toasts); elsewhere [`AlertSink::schedule`] reports an error and the
/// in-process countdown is the sole delivery mechanism.
pub struct CommandAlertSink {
    timeout: Duration,
}

impl CommandAlertSink {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        run_command(self.timeout, program, args).await.map(|_| ())
    }

    /// Fire-and-forget desktop notification.
    async fn notify(&self, title: &str, body: &str) {
        let outcome = if cfg!(target_os = "linux") {
            self.run("notify-send", &[title, body]).await
        } else if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                script_safe(body),
                script_safe(title)
            );
            self.run("osascript", &["-e", &script]).await
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "(New-Object -ComObject WScript.Shell).Popup('{}', 4, '{}', 48) | Out-Null",
                script_safe(body),
                script_safe(title)
            );
            self.run("powershell", &["-NoProfile", "-Command", &script])
                .await
        } else {
            Ok(())
        };
        if let Err(e) = outcome {
            debug!("desktop notification failed: {e}");
        }
    }

    /// Blocking acknowledgement dialog. Returns when the user dismisses
    /// it, or immediately when no dialog helper exists on the host.
    async fn acknowledge(&self, label: &str) -> Result<()> {
        let text = format!("Alarm: {}", script_safe(label));
        let spawned = if cfg!(target_os = "linux") {
            tokio::process::Command::new("zenity")
                .args(["--info", "--title", "Alarm", "--text", &text])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
        } else if cfg!(target_os = "macos") {
            let script = format!(
                "display dialog \"{text}\" with title \"Alarm\" buttons {{\"Dismiss\"}} default button 1"
            );
            tokio::process::Command::new("osascript")
                .args(["-e", &script])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "(New-Object -ComObject WScript.Shell).Popup('{text}', 0, 'Alarm', 48) | Out-Null"
            );
            tokio::process::Command::new("powershell")
                .args(["-NoProfile", "-Command", &script])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
        } else {
            return Ok(());
        };

        match spawned {
            Ok(mut child) => {
                child
                    .wait()
                    .await
                    .map_err(|e| ValetError::Platform(format!("alert dialog failed: {e}")))?;
                Ok(())
            }
            Err(e) => {
                // Headless or stripped-down host: the notification above
                // already went out, so treat the alert as delivered.
                warn!("no alert dialog helper available: {e}");
                Ok(())
            }
        }
    }
}

/// Play one alert chime, best effort.
async fn play_chime(timeout: Duration) -> Result<()> {
    if cfg!(target_os = "linux") {
        run_command(
            timeout,
            "paplay",
            &["/usr/share/sounds/freedesktop/stereo/alarm-clock-elapsed.oga"],
        )
        .await
        .map(|_| ())
    } else if cfg!(target_os = "macos") {
        run_command(timeout, "afplay", &["/System/Library/Sounds/Ping.aiff"])
            .await
            .map(|_| ())
    } else if cfg!(target_os = "windows") {
        run_command(
            timeout,
            "powershell",
            &["-NoProfile", "-Command", "[console]::beep(1500, 400)"],
        )
        .await
        .map(|_| ())
    } else {
        Ok(())
    }
}

#[async_trait]
impl AlertSink for CommandAlertSink {
    async fn schedule(&self, label: &str, time_of_day: &str) -> Result<()> {
        if !cfg!(target_os = "windows") {
            return Err(ValetError::Platform(
                "no native scheduled notifications on this host".into(),
            ));
        }
        let label = script_safe(label);
        let safe_id = crate::normalize::safe_label(&label);
        // BurntToast scheduled toast with the looping alarm sound. The
        // identifier lets a later cancel find it again.
        let script = format!(
            "$now = Get-Date; \
             $parts = '{time_of_day}'.Split(':'); \
             $dt = ($now.Date).AddHours([int]$parts[0]).AddMinutes([int]$parts[1]); \
             if ($dt -le $now) {{ $dt = $dt.AddDays(1) }}; \
             Import-Module BurntToast -ErrorAction Stop; \
             $t1 = New-BTText -Content 'Alarm'; \
             $t2 = New-BTText -Content '{label}'; \
             $bind = New-BTBinding -Children $t1,$t2; \
             $vis = New-BTVisual -BindingGeneric $bind; \
             $aud = New-BTAudio -Source 'ms-winsoundevent:Notification.Looping.Alarm2' -Loop; \
             $c = New-BTContent -Visual $vis -Audio $aud -Scenario alarm; \
             Submit-BTNotification -Content $c -Schedule -DeliveryTime $dt -UniqueIdentifier 'valet-{safe_id}'"
        );
        self.run(
            "powershell",
            &[
                "-NoProfile",
                "-NonInteractive",
                "-WindowStyle",
                "Hidden",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                &script,
            ],
        )
        .await
    }

    async fn cancel_by_id(&self, safe_label: &str) -> Result<()> {
        if !cfg!(target_os = "windows") {
            return Ok(());
        }
        let safe_id = script_safe(safe_label);
        let script = format!(
            "try {{ Import-Module BurntToast -ErrorAction Stop; \
             Remove-BTNotification -UniqueIdentifier 'valet-{safe_id}' }} catch {{ }}"
        );
        self.run(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", &script],
        )
        .await
    }

    async fn cancel_at(&self, time_of_day: &str) -> Result<()> {
        if !cfg!(target_os = "windows") {
            return Ok(());
        }
        let Some((hh, mm)) = time_of_day.split_once(':') else {
            return Err(ValetError::Platform(format!(
                "bad time for cancel: {time_of_day}"
            )));
        };
        let (hh, mm) = (script_safe(hh), script_safe(mm));
        // Walk the scheduled toasts and drop every one delivering at the
        // given wall-clock minute, whatever its label.
        let script = format!(
            "try {{ \
             $notifier = [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('BurntToast'); \
             foreach ($n in $notifier.GetScheduledToastNotifications()) {{ \
               $t = $n.DeliveryTime.ToLocalTime(); \
               if ($t.Hour -eq {hh} -and $t.Minute -eq {mm}) {{ $notifier.RemoveFromSchedule($n) }} \
             }} }} catch {{ }}"
        );
        self.run(
            "powershell",
            &["-NoProfile", "-NonInteractive", "-Command", &script],
        )
        .await
    }

    async fn ring_until_dismissed(&self, label: &str) -> Result<()> {
        self.notify("Alarm", label).await;
        let chime_timeout = self.timeout;
        let chime = tokio::spawn(async move {
            loop {
                if play_chime(chime_timeout).await.is_err() {
                    // No audio player on this host; do not spin.
                    tokio::time::sleep(Duration::from_secs(5)).await;
                } else {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        });
        let outcome = self.acknowledge(label).await;
        chime.abort();
        outcome
    }
}

/// Opens URLs and file paths with the desktop's default handler.
pub struct DesktopLinkOpener;

#[async_trait]
impl LinkOpener for DesktopLinkOpener {
    async fn open(&self, target: &str) -> Result<()> {
        let owned = target.to_string();
        tokio::task::spawn_blocking(move || open::that(&owned))
            .await
            .map_err(|e| ValetError::Platform(format!("link opener task failed: {e}")))?
            .map_err(|e| ValetError::Platform(format!("failed to open {target}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn script_safe_strips_quotes() {
        assert_eq!(script_safe("wake 'me' \"up\" `now`"), "wake me up now");
        assert_eq!(script_safe("plain label"), "plain label");
    }

    #[tokio::test]
    async fn run_command_reports_missing_program() {
        let err = run_command(
            Duration::from_secs(2),
            "valet-no-such-binary-xyz",
            &["--version"],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ValetError::Platform(_)));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn run_command_captures_exit_code() {
        // `false` exists on every unix host this suite runs on.
        if cfg!(unix) {
            let err = run_command(Duration::from_secs(2), "false", &[])
                .await
                .unwrap_err();
            assert!(err.to_string().contains("exited with code"));
        }
    }

    #[tokio::test]
    async fn run_command_times_out() {
        if cfg!(unix) {
            let err = run_command(Duration::from_millis(100), "sleep", &["5"])
                .await
                .unwrap_err();
            assert!(err.to_string().contains("timed out"));
        }
    }

    #[tokio::test]
    async fn schedule_errors_without_native_path() {
        if !cfg!(target_os = "windows") {
            let sink = CommandAlertSink::new(Duration::from_secs(2));
            let err = sink.schedule("Wake", "07:30").await.unwrap_err();
            assert!(err.to_string().contains("no native scheduled"));
        }
    }

    #[tokio::test]
    async fn cancel_is_best_effort_without_native_path() {
        if !cfg!(target_os = "windows") {
            let sink = CommandAlertSink::new(Duration::from_secs(2));
            sink.cancel_by_id("Wake").await.unwrap();
            sink.cancel_at("07:30").await.unwrap();
        }
    }
}
