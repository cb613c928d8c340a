//! Application path management
//!
//! A `dashboard.yaml` in the current directory wins (local mode, everything
//! next to it). Otherwise the config lives in the user config directory and
//! history, plots and logs in the user data directory.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name below the platform config/data directories
const APP_DIR: &str = "lock-dashboard";
/// Config file name looked up in the current directory
pub const CONFIG_FILE: &str = "dashboard.yaml";
const EXAMPLE_CONFIG: &str = "dashboard.example.yaml";

/// Application paths for config, history, plots, and logs
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config: PathBuf,
    /// REPL history, plots
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Everything next to a config in the working directory
    pub is_local: bool,
}

impl AppPaths {
    /// Detect paths from the environment
    ///
    /// Called before logging is initialized, so nothing here logs.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join(CONFIG_FILE).exists() {
            return Self::local(&cwd);
        }

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| cwd.clone())
            .join(APP_DIR);
        let data_dir = dirs::data_dir().unwrap_or_else(|| cwd.clone()).join(APP_DIR);

        Self {
            config: config_dir.join(CONFIG_FILE),
            logs_dir: data_dir.join("logs"),
            data_dir,
            is_local: false,
        }
    }

    /// All files below `dir`
    pub fn local(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            data_dir: dir.join(".dashboard"),
            logs_dir: dir.join("logs"),
            is_local: true,
        }
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.txt")
    }

    /// Where fetched plots are written
    pub fn plot_file(&self) -> PathBuf {
        self.data_dir.join("plot.svg")
    }

    /// Create missing directories; seed the config from the example if absent
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.data_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        if let Some(config_parent) = self.config.parent() {
            if !config_parent.exists() {
                std::fs::create_dir_all(config_parent)?;
            }
        }

        if !self.config.exists() {
            self.copy_example_config()?;
        }

        Ok(())
    }

    fn copy_example_config(&self) -> anyhow::Result<()> {
        let example = PathBuf::from(EXAMPLE_CONFIG);
        if example.exists() {
            info!("Copying example config to {}", self.config.display());
            std::fs::copy(&example, &self.config).with_context(|| {
                format!(
                    "Failed to copy example config from {} to {}",
                    example.display(),
                    self.config.display()
                )
            })?;
            return Ok(());
        }

        info!("No config found, please create {}", self.config.display());
        Ok(())
    }
}
