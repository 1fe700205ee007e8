//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::AppConfig;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Load the file once and forward it if valid.
    ///
    /// Returns whether an update was sent.
    pub fn reload(&self) -> bool {
        match load_config(&self.path) {
            Ok(new_config) => self.update_tx.send(new_config).is_ok(),
            Err(e) => {
                tracing::error!(
                    "Failed to reload config: {}. Keeping current configuration.",
                    e
                );
                false
            }
        }
    }

    /// Start watching the file in a background thread.
    pub fn run(self, poll_interval: Duration) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        self.reload();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reload_forwards_valid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[flag]\nbase_url = \"https://beta.example.com\"").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(file.path());
        assert!(watcher.reload());

        let config = rx.try_recv().unwrap();
        assert_eq!(config.flag.base_url, "https://beta.example.com");
    }

    #[test]
    fn test_reload_drops_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[flag]\nbase_url = \"not a url\"").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(file.path());
        assert!(!watcher.reload());
        assert!(rx.try_recv().is_err());
    }
}
