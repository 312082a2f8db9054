//! Configuration module for StudyPad sync.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, defaults, and a platform-appropriate default path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the sync layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub sync: SyncSettings,
    pub remote: RemoteSettings,
    pub logging: LoggingSettings,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Milliseconds a burst of local mutations must be quiet before a sync
    /// pass is triggered.
    pub debounce_ms: u64,
    /// Seconds between periodic sync passes while the app is foregrounded
    /// and the network is available.
    pub poll_interval_secs: u64,
    /// Transient failures per queue entry before the entity is marked
    /// errored and auto-retry stops.
    pub max_retries: u32,
    /// Base delay for the per-entry exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,
    /// Cap on the per-entry backoff delay, in seconds.
    pub backoff_cap_secs: u64,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL of the sync backend.
    pub base_url: String,
    /// Per-request timeout in seconds; a timed-out call counts as a
    /// transient failure.
    pub request_timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/studypad/sync.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("studypad")
            .join("sync.yaml")
    }
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(String, String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

impl SyncSettings {
    /// The debounce window as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// The periodic poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// The backoff base delay as a chrono `Duration` for queue bookkeeping.
    pub fn backoff_base(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.backoff_base_ms as i64)
    }

    /// The backoff cap as a chrono `Duration` for queue bookkeeping.
    pub fn backoff_cap(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.backoff_cap_secs as i64)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            poll_interval_secs: 120,
            max_retries: 5,
            backoff_base_ms: 500,
            backoff_cap_secs: 60,
        }
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://sync.studypad.app".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.debounce_ms, 1000);
        assert_eq!(config.sync.poll_interval_secs, 120);
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "sync:\n  debounce_ms: 250\n  poll_interval_secs: 30\n  max_retries: 3\n  backoff_base_ms: 100\n  backoff_cap_secs: 10\nremote:\n  base_url: http://localhost:8080\n  request_timeout_secs: 5\nlogging:\n  level: debug\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.remote.base_url, "http://localhost:8080");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/sync.yaml"));
        assert_eq!(config.sync.debounce_ms, 1000);
    }

    #[test]
    fn test_duration_accessors() {
        let settings = SyncSettings::default();
        assert_eq!(settings.debounce(), Duration::from_millis(1000));
        assert_eq!(settings.poll_interval(), Duration::from_secs(120));
        assert_eq!(settings.backoff_base(), chrono::Duration::milliseconds(500));
        assert_eq!(settings.backoff_cap(), chrono::Duration::seconds(60));
    }

    #[test]
    fn test_default_path_ends_with_config_file() {
        let path = Config::default_path();
        assert!(path.ends_with("studypad/sync.yaml"));
    }
}
