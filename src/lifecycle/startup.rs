//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter
//! - Create the flag client and the level controller task
//! - Load the flags file and start watching it
//! - Watch the config file and publish new flag settings
//!
//! A flags file that cannot be loaded at startup is not fatal: the
//! controller stays at the fallback level until the file becomes valid.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::{shared_settings, AppConfig, ConfigWatcher, SharedFlagSettings};
use crate::controller::LevelController;
use crate::flag::{FileFlagClient, FlagClient};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::observability::StructuredLogger;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Handles to the running service.
pub struct Service {
    shutdown: Shutdown,
    settings: SharedFlagSettings,
    controller: JoinHandle<LevelController>,
    reload_task: Option<JoinHandle<()>>,
    _watchers: Vec<RecommendedWatcher>,
}

impl Service {
    pub fn settings(&self) -> &SharedFlagSettings {
        &self.settings
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Run until SIGINT/SIGTERM, then stop every task.
    pub async fn run_until_signal(self) -> Option<LevelController> {
        signals::wait_for_signal().await;
        self.stop().await
    }

    /// Trigger shutdown and wait for the controller to exit.
    pub async fn stop(self) -> Option<LevelController> {
        self.shutdown.trigger();

        if let Some(task) = self.reload_task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Config reload task failed");
            }
        }
        match self.controller.await {
            Ok(controller) => {
                tracing::info!(level = %controller.current_level(), "Level controller stopped");
                Some(controller)
            }
            Err(e) => {
                tracing::error!(error = %e, "Level controller task failed");
                None
            }
        }
    }
}

/// Start every subsystem.
///
/// `config_path` enables hot reload of the `[flag]` section when set.
pub async fn start(
    config: AppConfig,
    config_path: Option<PathBuf>,
    logger: StructuredLogger,
) -> Result<Service, StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let settings = shared_settings(config.flag.clone());
    let poll_interval = Duration::from_secs(config.flag_source.poll_interval_secs);

    let client = FileFlagClient::new(&config.flag_source.path);
    let events = client.subscribe();
    let controller = LevelController::new(Arc::new(client.clone()), logger, settings.clone());
    let controller = tokio::spawn(controller.run(events, shutdown.subscribe()));

    if let Err(e) = client.reload() {
        tracing::warn!(
            error = %e,
            fallback = %config.flag.fallback_level,
            "Flags not loaded yet, staying at fallback level"
        );
    }

    let mut watchers = Vec::new();
    watchers.push(
        client
            .watch(poll_interval)
            .map_err(|source| StartupError::Watch {
                path: config.flag_source.path.clone(),
                source,
            })?,
    );

    let mut reload_task = None;
    if let Some(path) = config_path {
        let (watcher, updates) = ConfigWatcher::new(&path);
        watchers.push(
            watcher
                .run(poll_interval)
                .map_err(|source| StartupError::Watch { path, source })?,
        );
        reload_task = Some(tokio::spawn(apply_config_updates(
            updates,
            settings.clone(),
            shutdown.subscribe(),
        )));
    }

    tracing::info!(
        flag = %config.flag.flag_name,
        base_url = %config.flag.base_url,
        flags_file = ?config.flag_source.path,
        "Startup complete"
    );

    Ok(Service {
        shutdown,
        settings,
        controller,
        reload_task,
        _watchers: watchers,
    })
}

/// Publish the `[flag]` section of every reloaded config.
async fn apply_config_updates(
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
    settings: SharedFlagSettings,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    if **settings.load() != config.flag {
                        tracing::info!(
                            flag = %config.flag.flag_name,
                            base_url = %config.flag.base_url,
                            "Flag settings reloaded"
                        );
                        settings.store(Arc::new(config.flag));
                    }
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
