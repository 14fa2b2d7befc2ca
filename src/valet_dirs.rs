//! Centralized application directory paths for valet.
//!
//! Provides a single source of truth for all filesystem paths used by the
//! router. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/valet/` | `~/.local/share/valet/` |
//! | Config | `~/Library/Application Support/valet/` | `~/.config/valet/` |
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `VALET_DATA_DIR` overrides [`data_dir`]
//! - `VALET_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Used for persistent state: the learned policy document, the metrics log,
/// generated content files, and logs.
///
/// Resolves to `dirs::data_dir()/valet/` by default. Override with
/// the `VALET_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VALET_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("valet"))
        .unwrap_or_else(|| PathBuf::from("/tmp/valet-data"))
}

/// Application config directory.
///
/// Used for `config.toml`.
///
/// Resolves to `dirs::config_dir()/valet/` by default. Override with
/// the `VALET_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("VALET_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("valet"))
        .unwrap_or_else(|| PathBuf::from("/tmp/valet-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Generated content directory (`data_dir()/content/`).
///
/// The content handler writes authored text files here before opening them.
#[must_use]
pub fn content_dir() -> PathBuf {
    data_dir().join("content")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted adaptive-policy state path (`data_dir()/policy.json`).
#[must_use]
pub fn policy_file() -> PathBuf {
    data_dir().join("policy.json")
}

/// Append-only policy metrics log path (`data_dir()/metrics.csv`).
#[must_use]
pub fn metrics_file() -> PathBuf {
    data_dir().join("metrics.csv")
}

/// Serializes every test in this binary that reads or writes the
/// `VALET_*` environment overrides.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_nonempty() {
        let _env = env_lock();
        let dir = data_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn data_dir_contains_valet() {
        let _env = env_lock();
        let dir = data_dir();
        let s = dir.to_string_lossy();
        assert!(s.contains("valet"), "data_dir should contain 'valet': {s}");
    }

    #[test]
    fn config_dir_is_nonempty() {
        let _env = env_lock();
        let dir = config_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let _env = env_lock();
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn policy_file_ends_with_policy_json() {
        let _env = env_lock();
        let path = policy_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("policy.json"), "policy_file: {s}");
    }

    #[test]
    fn logs_dir_is_subpath_of_data_dir() {
        let _env = env_lock();
        let logs = logs_dir();
        let data = data_dir();
        assert!(
            logs.starts_with(&data),
            "logs_dir ({}) should start with data_dir ({})",
            logs.display(),
            data.display()
        );
    }

    #[test]
    fn content_dir_is_subpath_of_data_dir() {
        let _env = env_lock();
        let content = content_dir();
        let data = data_dir();
        assert!(
            content.starts_with(&data),
            "content_dir ({}) should start with data_dir ({})",
            content.display(),
            data.display()
        );
    }

    #[test]
    fn data_dir_override_via_env() {
        let _env = env_lock();
        let key = "VALET_DATA_DIR";
        let original = std::env::var_os(key);

        // SAFETY: env_lock serializes all VALET_* mutation in this binary.
        unsafe { std::env::set_var(key, "/custom/data") };
        let result = data_dir();
        assert_eq!(result, PathBuf::from("/custom/data"));

        // Restore.
        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }

    #[test]
    fn config_dir_override_via_env() {
        let _env = env_lock();
        let key = "VALET_CONFIG_DIR";
        let original = std::env::var_os(key);

        // SAFETY: env_lock serializes all VALET_* mutation in this binary.
        unsafe { std::env::set_var(key, "/custom/config") };
        let result = config_dir();
        assert_eq!(result, PathBuf::from("/custom/config"));

        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }
}
