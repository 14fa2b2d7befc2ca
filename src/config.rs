//! Configuration types for the command router.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the router.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValetConfig {
    /// Normalization and dispatch settings.
    pub dispatch: DispatchConfig,
    /// System action engine settings.
    pub system: SystemConfig,
    /// Adaptive parameter policy settings.
    pub policy: PolicyConfig,
}

/// Normalization and dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Whether loosely-phrased input is rewritten onto canonical prefixes
    /// before dispatch ("write a poem" -> "content a poem").
    pub freeform_mapping: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            freeform_mapping: true,
        }
    }
}

/// System action engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Timeout in seconds for OS-level calls (scheduling a notification,
    /// volume/power commands). On expiry the call is abandoned and the
    /// in-process fallback takes over.
    pub command_timeout_secs: u64,
    /// How many key-step repetitions a single volume up/down command sends.
    pub volume_repeat: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 12,
            volume_repeat: 3,
        }
    }
}

/// Adaptive parameter policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Exploration probability per parameter dimension.
    pub epsilon: f64,
    /// Whether reward observations are appended to the metrics CSV.
    pub metrics_log: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.08,
            metrics_log: true,
        }
    }
}

impl ValetConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ValetError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ValetError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (`config_dir()/config.toml`).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::valet_dirs::config_file()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ValetConfig::default();
        assert!(config.dispatch.freeform_mapping);
        assert!(config.system.command_timeout_secs > 0);
        assert!(config.system.volume_repeat > 0);
        assert!(config.policy.epsilon > 0.0 && config.policy.epsilon < 1.0);
        assert!(config.policy.metrics_log);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("valet-test-config-roundtrip");
        let path = dir.join("config.toml");

        let mut config = ValetConfig::default();
        config.system.volume_repeat = 5;
        config.policy.epsilon = 0.25;
        config.dispatch.freeform_mapping = false;

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = ValetConfig::from_file(&path);
        assert!(loaded.is_ok());
        let loaded = match loaded {
            Ok(c) => c,
            Err(_) => unreachable!("load should succeed"),
        };
        assert_eq!(loaded.system.volume_repeat, 5);
        assert!((loaded.policy.epsilon - 0.25).abs() < f64::EPSILON);
        assert!(!loaded.dispatch.freeform_mapping);

        // Cleanup
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ValetConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("valet-test-config-invalid");
        let path = dir.join("bad.toml");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(&path, "this is not valid toml {{{").ok();

        let result = ValetConfig::from_file(&path);
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = std::env::temp_dir().join("valet-test-config-partial");
        let path = dir.join("partial.toml");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(&path, "[policy]\nepsilon = 0.5\n").ok();

        let loaded = ValetConfig::from_file(&path).unwrap();
        assert!((loaded.policy.epsilon - 0.5).abs() < f64::EPSILON);
        assert_eq!(loaded.system.volume_repeat, 3);
        assert!(loaded.dispatch.freeform_mapping);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
