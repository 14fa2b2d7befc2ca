//! Application launch and close.
//!
//! The resolver walks a fallback chain: a PATH executable probe, the
//! desktop's own application catalog, and finally a web search for the
//! official site. Each miss is logged before the next strategy runs.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::platform::LinkOpener;
use crate::platform::command::run_command;

/// Launches and closes applications by name.
///
/// Both calls report success as a flag and never error past the
/// boundary; strategy failures stay internal.
#[async_trait]
pub trait AppControl: Send + Sync {
    /// Try to start the named application.
    async fn launch(&self, name: &str) -> bool;
    /// Try to close the named application.
    async fn close(&self, name: &str) -> bool;
}

/// Default resolver chain over the host desktop.
pub struct DesktopAppResolver {
    links: Arc<dyn LinkOpener>,
    timeout: Duration,
}

impl DesktopAppResolver {
    #[must_use]
    pub fn new(links: Arc<dyn LinkOpener>, timeout: Duration) -> Self {
        Self { links, timeout }
    }

    /// Strategy 1: the name is an executable on PATH. Spawn it detached.
    fn try_path_launch(&self, name: &str) -> Result<(), String> {
        let path = which::which(name).map_err(|e| format!("not on PATH: {e}"))?;
        tokio::process::Command::new(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("spawn of {} failed: {e}", path.display()))?;
        Ok(())
    }

    /// Strategy 2: ask the desktop's application catalog.
    async fn try_catalog_launch(&self, name: &str) -> Result<(), String> {
        let outcome = if cfg!(target_os = "linux") {
            run_command(self.timeout, "gtk-launch", &[name]).await
        } else if cfg!(target_os = "macos") {
            run_command(self.timeout, "open", &["-a", name]).await
        } else if cfg!(target_os = "windows") {
            run_command(self.timeout, "cmd", &["/C", "start", "", name]).await
        } else {
            return Err("no application catalog on this host".into());
        };
        outcome.map(|_| ()).map_err(|e| e.to_string())
    }

    /// Strategy 3: open a web search for the official site.
    async fn try_web_fallback(&self, name: &str) -> Result<(), String> {
        let query = urlencoding::encode(name);
        let url = format!("https://www.google.com/search?q={query}+official+website");
        self.links.open(&url).await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl AppControl for DesktopAppResolver {
    async fn launch(&self, name: &str) -> bool {
        match self.try_path_launch(name) {
            Ok(()) => {
                info!("launched {name} from PATH");
                return true;
            }
            Err(reason) => debug!("PATH launch of {name}: {reason}"),
        }
        match self.try_catalog_launch(name).await {
            Ok(()) => {
                info!("launched {name} via application catalog");
                return true;
            }
            Err(reason) => debug!("catalog launch of {name}: {reason}"),
        }
        match self.try_web_fallback(name).await {
            Ok(()) => {
                info!("no local install of {name}, opened a web search instead");
                true
            }
            Err(reason) => {
                warn!("every launch strategy for {name} failed, last: {reason}");
                false
            }
        }
    }

    async fn close(&self, name: &str) -> bool {
        let outcome = if cfg!(target_os = "windows") {
            let image = if name.ends_with(".exe") {
                name.to_string()
            } else {
                format!("{name}.exe")
            };
            run_command(self.timeout, "taskkill", &["/IM", &image, "/F"]).await
        } else {
            // -f matches the full command line, catching apps whose
            // process name differs from the spoken one.
            run_command(self.timeout, "pkill", &["-f", name]).await
        };
        match outcome {
            Ok(_) => {
                info!("closed {name}");
                true
            }
            Err(reason) => {
                debug!("close of {name}: {reason}");
                false
            }
        }
    }
}

/// App control that only records calls. Used by tests and recording
/// builds; launches always succeed, closes always fail.
#[derive(Default)]
pub struct StubAppControl {
    calls: std::sync::Mutex<Vec<String>>,
}

impl StubAppControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls seen so far, e.g. `launch(chrome)`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }
}

#[async_trait]
impl AppControl for StubAppControl {
    async fn launch(&self, name: &str) -> bool {
        self.record(format!("launch({name})"));
        true
    }

    async fn close(&self, name: &str) -> bool {
        self.record(format!("close({name})"));
        false
    }
}

/// Build the default app control for this host.
#[must_use]
pub fn create_app_control(links: Arc<dyn LinkOpener>, timeout: Duration) -> Arc<dyn AppControl> {
    Arc::new(DesktopAppResolver::new(links, timeout))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::platform::StubLinkOpener;

    #[tokio::test]
    async fn stub_records_launch_and_close() {
        let apps = StubAppControl::new();
        assert!(apps.launch("chrome").await);
        assert!(!apps.close("chrome").await);
        assert_eq!(apps.calls(), vec!["launch(chrome)", "close(chrome)"]);
    }

    #[tokio::test]
    async fn unknown_app_falls_back_to_web_search() {
        let links = Arc::new(StubLinkOpener::default());
        let resolver = DesktopAppResolver::new(links.clone(), Duration::from_secs(2));
        assert!(resolver.launch("valet-no-such-app-xyz").await);
        let targets = links.targets();
        assert_eq!(targets.len(), 1);
        assert!(targets[0].contains("google.com/search"));
        assert!(targets[0].contains("valet-no-such-app-xyz"));
        assert!(targets[0].contains("official+website"));
    }

    #[tokio::test]
    async fn close_of_absent_process_reports_false() {
        if cfg!(unix) {
            let links = Arc::new(StubLinkOpener::default());
            let resolver = DesktopAppResolver::new(links, Duration::from_secs(2));
            assert!(!resolver.close("valet-no-such-process-xyz").await);
        }
    }
}
