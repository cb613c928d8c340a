//! Hot reload of the polling section
//!
//! The parent directory is watched rather than the file itself: editors that
//! save through a temp file and a rename replace the inode, which drops a
//! watch placed on the file path. Only a changed `polling` section is
//! forwarded; everything else in the file is read once at startup.

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{DashboardConfig, PollingConfig};

/// Quiet period after the last file event before the file is re-read
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Yields the polling settings each time they change on disk
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PollingConfig>,
}

impl ConfigWatcher {
    /// Load the config once and start watching its directory
    pub async fn new(config_path: String) -> Result<(Self, DashboardConfig)> {
        let initial = DashboardConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        let path = PathBuf::from(&config_path);
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| anyhow!("Config path has no file name: {}", config_path))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify calls back on its own thread; an unbounded send needs no runtime
        let (touched_tx, touched_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if touches(&event, &file_name) => {
                    debug!(kind = ?event.kind, "Config file event");
                    let _ = touched_tx.send(());
                }
                Ok(_) => {}
                Err(e) => error!("Config watch error: {}", e),
            }
        })?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        let (tx, rx) = mpsc::channel(10);
        tokio::spawn(reload_loop(config_path.clone(), initial.polling, touched_rx, tx));

        info!(config = %config_path, "Watching config for polling changes");
        Ok((
            Self {
                _watcher: watcher,
                rx,
            },
            initial,
        ))
    }

    /// Next changed polling section; `None` once the watcher is gone
    pub async fn next_polling(&mut self) -> Option<PollingConfig> {
        self.rx.recv().await
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

/// Re-read the file after each burst of events; forward only new polling values
async fn reload_loop(
    config_path: String,
    mut current: PollingConfig,
    mut touched: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<PollingConfig>,
) {
    while touched.recv().await.is_some() {
        tokio::time::sleep(DEBOUNCE).await;
        while touched.try_recv().is_ok() {}

        if !Path::new(&config_path).exists() {
            // mid-rename; the create event of the new file follows
            continue;
        }

        match DashboardConfig::load(&config_path).await {
            Ok(config) if config.polling != current => {
                info!(
                    status_ms = config.polling.status_interval_ms,
                    plot_ms = config.polling.plot_interval_ms,
                    "Polling settings changed"
                );
                current = config.polling;
                if tx.send(current).await.is_err() {
                    break;
                }
            }
            Ok(_) => debug!("Config saved without polling changes"),
            Err(e) => warn!("Failed to reload config (keeping old settings): {:#}", e),
        }
    }
    debug!("Config reload loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_yaml(status_ms: u64, watch_streams: bool) -> String {
        format!(
            "server:\n  base_url: \"http://localhost:5000\"\npolling:\n  status_interval_ms: {}\ndashboard:\n  watch_streams: {}\n",
            status_ms, watch_streams
        )
    }

    async fn watch(dir: &TempDir) -> Result<(ConfigWatcher, PathBuf)> {
        let path = dir.path().join("dashboard.yaml");
        fs::write(&path, config_yaml(5000, false))?;
        let (watcher, config) = ConfigWatcher::new(path.to_string_lossy().to_string()).await?;
        assert_eq!(config.polling.status_interval_ms, 5000);
        // let the backend settle before the first write
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok((watcher, path))
    }

    #[tokio::test]
    async fn test_forwards_changed_polling_interval() -> Result<()> {
        let dir = TempDir::new()?;
        let (mut watcher, path) = watch(&dir).await?;

        fs::write(&path, config_yaml(2500, false))?;

        let polling = tokio::time::timeout(Duration::from_secs(2), watcher.next_polling())
            .await?
            .ok_or_else(|| anyhow!("watcher closed"))?;
        assert_eq!(polling.status_interval_ms, 2500);
        Ok(())
    }

    #[tokio::test]
    async fn test_survives_save_by_rename() -> Result<()> {
        let dir = TempDir::new()?;
        let (mut watcher, path) = watch(&dir).await?;

        for status_ms in [2500, 1200] {
            let tmp = dir.path().join(".dashboard.yaml.swp");
            fs::write(&tmp, config_yaml(status_ms, false))?;
            fs::rename(&tmp, &path)?;

            let polling = tokio::time::timeout(Duration::from_secs(2), watcher.next_polling())
                .await?
                .ok_or_else(|| anyhow!("watcher closed"))?;
            assert_eq!(polling.status_interval_ms, status_ms);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_ignores_changes_outside_polling() -> Result<()> {
        let dir = TempDir::new()?;
        let (mut watcher, path) = watch(&dir).await?;

        fs::write(&path, config_yaml(5000, true))?;
        assert!(
            tokio::time::timeout(Duration::from_millis(600), watcher.next_polling())
                .await
                .is_err()
        );

        // an invalid file keeps the old settings
        fs::write(&path, "server: [")?;
        tokio::time::sleep(Duration::from_millis(400)).await;

        fs::write(&path, config_yaml(3000, true))?;
        let polling = tokio::time::timeout(Duration::from_secs(2), watcher.next_polling())
            .await?
            .ok_or_else(|| anyhow!("watcher closed"))?;
        assert_eq!(polling.status_interval_ms, 3000);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let result = ConfigWatcher::new("/nonexistent/dashboard.yaml".to_string()).await;
        assert!(result.is_err());
    }
}
