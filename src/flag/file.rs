//! Flag client backed by a TOML flags file.
//!
//! # File Format
//! ```toml
//! [flags.log-level]
//! enabled = true
//!
//! [flags.log-level.variant]
//! name = "acme.example.com"
//! enabled = true
//! payload = { value = '{"global": "debug"}' }
//! ```
//!
//! The first successful load emits `Synchronized`; each later load whose
//! content differs from the previous snapshot emits `Changed`. A failed load
//! keeps the previous snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::flag::{
    FlagClient, FlagClientError, FlagEvent, FlagSnapshot, Variant, EVENT_CHANNEL_CAPACITY,
};

/// Errors raised while loading the flags file.
#[derive(Debug, Error)]
pub enum FlagSourceError {
    #[error("failed to read flags file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flags file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

struct Inner {
    path: PathBuf,
    snapshot: ArcSwapOption<FlagSnapshot>,
    events: broadcast::Sender<FlagEvent>,
}

/// A flag client reading its state from disk.
#[derive(Clone)]
pub struct FileFlagClient {
    inner: Arc<Inner>,
}

impl FileFlagClient {
    /// Create a client for `path`. Nothing is read until [`reload`](Self::reload).
    pub fn new(path: &Path) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                snapshot: ArcSwapOption::empty(),
                events,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Whether a snapshot has been loaded.
    pub fn is_synchronized(&self) -> bool {
        self.inner.snapshot.load().is_some()
    }

    /// Read the flags file and publish the snapshot.
    ///
    /// Returns the event emitted, if any.
    pub fn reload(&self) -> Result<Option<FlagEvent>, FlagSourceError> {
        let snapshot = load_snapshot(&self.inner.path)?;
        let previous = self.inner.snapshot.swap(Some(Arc::new(snapshot.clone())));

        let event = match previous {
            None => Some(FlagEvent::Synchronized),
            Some(prev) if *prev != snapshot => Some(FlagEvent::Changed),
            Some(_) => None,
        };

        if let Some(event) = event {
            tracing::debug!(
                path = ?self.inner.path,
                flags = snapshot.flags.len(),
                event = event.as_str(),
                "Flags file loaded"
            );
            let _ = self.inner.events.send(event);
        }
        Ok(event)
    }

    /// Watch the flags file and reload on every modification.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn watch(&self, poll_interval: Duration) -> Result<RecommendedWatcher, notify::Error> {
        let client = self.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        if let Err(e) = client.reload() {
                            tracing::error!(
                                "Failed to reload flags: {}. Keeping current flag state.",
                                e
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Flags watch error: {:?}", e),
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&self.inner.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.inner.path, "Flags watcher started");
        Ok(watcher)
    }

    fn current(&self) -> Result<Arc<FlagSnapshot>, FlagClientError> {
        self.inner.snapshot.load_full().ok_or(FlagClientError::NotReady)
    }
}

fn load_snapshot(path: &Path) -> Result<FlagSnapshot, FlagSourceError> {
    let content = fs::read_to_string(path).map_err(|source| FlagSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| FlagSourceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl FlagClient for FileFlagClient {
    fn is_enabled(&self, flag: &str) -> Result<bool, FlagClientError> {
        Ok(self.current()?.is_enabled(flag))
    }

    fn get_variant(&self, flag: &str) -> Result<Variant, FlagClientError> {
        Ok(self.current()?.variant(flag))
    }

    fn subscribe(&self) -> broadcast::Receiver<FlagEvent> {
        self.inner.events.subscribe()
    }
}
