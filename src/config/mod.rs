//! Configuration management for the lock dashboard
//!
//! Handles loading, parsing, and hot-reloading of the YAML configuration file.

pub mod watcher;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Lock server connection
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Timer periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,
    #[serde(default = "default_plot_interval")]
    pub plot_interval_ms: u64,
}

impl PollingConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn plot_interval(&self) -> Duration {
        Duration::from_millis(self.plot_interval_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval(),
            plot_interval_ms: default_plot_interval(),
        }
    }
}

/// Startup behaviour of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardSettings {
    /// Channel selected at startup; first listed channel when absent
    pub initial_channel: Option<String>,
    /// Print table and wavemeter events as they arrive
    #[serde(default)]
    pub watch_streams: bool,
}

/// Log output options (level comes from the CLI / environment)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    /// Also write a daily rolling log file to the logs directory
    #[serde(default)]
    pub file: bool,
}

impl DashboardConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: DashboardConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        let url = self.server.base_url.trim();
        if url.is_empty() {
            anyhow::bail!("server.base_url cannot be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("server.base_url must start with http:// or https:// (got '{}')", url);
        }
        if self.server.username.is_some() != self.server.password.is_some() {
            anyhow::bail!("server.username and server.password must be set together");
        }
        if self.polling.status_interval_ms == 0 {
            anyhow::bail!("polling.status_interval_ms must be greater than 0");
        }
        if self.polling.plot_interval_ms == 0 {
            anyhow::bail!("polling.plot_interval_ms must be greater than 0");
        }
        if let Some(name) = &self.dashboard.initial_channel {
            if name.trim().is_empty() {
                anyhow::bail!("dashboard.initial_channel cannot be empty");
            }
        }
        Ok(())
    }
}

fn default_connect_timeout() -> u64 { 3000 }
fn default_status_interval() -> u64 { 5000 }
fn default_plot_interval() -> u64 { 1000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: DashboardConfig = serde_yaml::from_str(
            r#"
server:
  base_url: "http://localhost:5000"
"#,
        )
        .unwrap();

        assert_eq!(config.server.connect_timeout_ms, 3000);
        assert_eq!(config.polling.status_interval(), Duration::from_millis(5000));
        assert_eq!(config.polling.plot_interval_ms, 1000);
        assert!(config.dashboard.initial_channel.is_none());
        assert!(!config.logging.json);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config: DashboardConfig =
            serde_yaml::from_str("server:\n  base_url: \"lockserver:5000\"\n").unwrap();
        assert!(config.validate().is_err());

        config.server.base_url = "http://lockserver:5000".to_string();
        config.server.username = Some("lab".to_string());
        assert!(config.validate().is_err());

        config.server.password = Some("secret".to_string());
        config.polling.status_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_from_file_validates() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dashboard.yaml");
        let path_str = path.to_string_lossy().to_string();

        std::fs::write(
            &path,
            r#"
server:
  base_url: "http://lockserver:5000"
polling:
  status_interval_ms: 2000
dashboard:
  initial_channel: "Ti:Sa"
"#,
        )?;
        let loaded = DashboardConfig::load(&path_str).await?;
        assert_eq!(loaded.polling.status_interval_ms, 2000);
        assert_eq!(loaded.polling.plot_interval_ms, 1000);
        assert_eq!(loaded.dashboard.initial_channel.as_deref(), Some("Ti:Sa"));

        std::fs::write(
            &path,
            "server:\n  base_url: \"http://lockserver:5000\"\npolling:\n  plot_interval_ms: 0\n",
        )?;
        assert!(DashboardConfig::load(&path_str).await.is_err());
        Ok(())
    }
}
