//! Runtime log level controller.
//!
//! # Data Flow
//! ```text
//! FlagEvent (broadcast from the flag client)
//!     → subscription.rs (Uninitialized / Armed gate)
//!     → on_flag_event: query client, derive tenant, resolver::resolve
//!     → compare with current level
//!     → apply to every sink of the StructuredLogger (only on change)
//! ```
//!
//! The controller owns the current level and the logger. Events are handled
//! one at a time on the controller's task, so the compare-then-apply step
//! needs no lock.

pub mod subscription;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::config::{FlagSettings, SharedFlagSettings};
use crate::flag::{FlagClient, FlagClientError, FlagEvent};
use crate::level::LogLevel;
use crate::observability::metrics;
use crate::observability::StructuredLogger;
use crate::resolver::{self, Resolution, TenantContext, TenantError};

pub use subscription::{Action, Subscription};

/// Errors that leave the current level untouched.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Client(#[from] FlagClientError),

    #[error(transparent)]
    Tenant(#[from] TenantError),
}

/// A level change that was applied to every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTransition {
    pub from: LogLevel,
    pub to: LogLevel,
}

pub struct LevelController {
    client: Arc<dyn FlagClient>,
    logger: StructuredLogger,
    settings: SharedFlagSettings,
    current: LogLevel,
    subscription: Subscription,
}

impl LevelController {
    /// Create a controller starting at the configured fallback level.
    pub fn new(
        client: Arc<dyn FlagClient>,
        logger: StructuredLogger,
        settings: SharedFlagSettings,
    ) -> Self {
        let current = settings.load().fallback_level;
        metrics::record_current_level(current);
        Self {
            client,
            logger,
            settings,
            current,
            subscription: Subscription::Uninitialized,
        }
    }

    pub fn current_level(&self) -> LogLevel {
        self.current
    }

    pub fn subscription(&self) -> Subscription {
        self.subscription
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Feed one lifecycle event through the subscription state machine.
    pub fn handle_event(&mut self, event: FlagEvent) -> Option<LevelTransition> {
        metrics::record_event(event);
        match self.subscription.action(event) {
            Action::ResolveAndArm => {
                let transition = self.on_flag_event();
                self.subscription = Subscription::Armed;
                tracing::debug!("Flag client synchronized, listening for changes");
                transition
            }
            Action::Resolve => self.on_flag_event(),
            Action::Ignore => {
                tracing::trace!(
                    event = event.as_str(),
                    state = ?self.subscription,
                    "Ignoring flag event"
                );
                None
            }
        }
    }

    /// Resolve the level from current flag state and apply it if it changed.
    pub fn on_flag_event(&mut self) -> Option<LevelTransition> {
        let settings = self.settings.load_full();
        tracing::trace!(flag = %settings.flag_name, "Flag event handler triggered");

        let resolved = match self.try_resolve(&settings) {
            Ok(level) => level,
            Err(e) => {
                tracing::error!(
                    flag = %settings.flag_name,
                    error = %e,
                    current = %self.current,
                    "Failed to resolve log level, keeping current level"
                );
                metrics::record_resolution_failure(&settings.flag_name);
                return None;
            }
        };

        if resolved == self.current {
            return None;
        }
        self.apply(resolved, &settings.flag_name)
    }

    fn try_resolve(&self, settings: &FlagSettings) -> Result<LogLevel, ResolutionError> {
        if !self.client.is_enabled(&settings.flag_name)? {
            tracing::debug!(
                flag = %settings.flag_name,
                fallback = %settings.fallback_level,
                "Flag disabled, using fallback log level"
            );
            return Ok(settings.fallback_level);
        }

        // The tenant is only needed once the flag is on.
        let tenant =
            TenantContext::from_base_url(&settings.base_url, &settings.default_variant_name)?;
        let variant = self.client.get_variant(&settings.flag_name)?;

        let input = Resolution {
            flag_enabled: true,
            variant: &variant,
            tenant: &tenant,
            level_key: &settings.global_log_level_key,
        };
        Ok(resolver::resolve(&input, settings.fallback_level))
    }

    /// Set every sink to `level`.
    ///
    /// The current level only advances when every sink accepted the change,
    /// so a partial failure is retried on the next event.
    fn apply(&mut self, level: LogLevel, flag: &str) -> Option<LevelTransition> {
        if let Err(errors) = self.logger.set_level(level) {
            for e in &errors {
                tracing::error!(
                    flag = %flag,
                    sink = %e.sink,
                    error = %e.detail,
                    "Failed to update sink level"
                );
                metrics::record_sink_failure(&e.sink);
            }
            return None;
        }

        let transition = LevelTransition {
            from: self.current,
            to: level,
        };
        tracing::info!(
            flag = %flag,
            from = %transition.from,
            to = %transition.to,
            "Updated log level"
        );
        self.current = level;
        metrics::record_transition(level);
        Some(transition)
    }

    /// Handle flag events until shutdown or until the client goes away.
    ///
    /// Returns the controller so its final state can be inspected.
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<FlagEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Self {
        tracing::info!(level = %self.current, "Level controller starting");

        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        self.handle_event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Dropped events can only be resolved by re-reading full state.
                        // While unarmed the skipped events may have included the
                        // Synchronized one, so a lag arms the controller. A burst of
                        // Changed events overflowing the channel before the first sync
                        // arms it early too; the re-read still reflects the client's
                        // current state.
                        let event = if self.subscription.is_armed() {
                            FlagEvent::Changed
                        } else {
                            FlagEvent::Synchronized
                        };
                        tracing::warn!(skipped, "Level controller lagged behind flag events");
                        self.handle_event(event);
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Flag client closed, level controller exiting");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Level controller received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::shared_settings;
    use crate::flag::{InMemoryFlagClient, Variant};
    use crate::observability::{LevelSink, SinkError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Writes(Mutex<Vec<LogLevel>>);

    struct TestSink {
        level: LogLevel,
        writes: Arc<Writes>,
    }

    impl LevelSink for TestSink {
        fn name(&self) -> &str {
            "test"
        }

        fn level(&self) -> LogLevel {
            self.level
        }

        fn set_level(&mut self, level: LogLevel) -> Result<(), SinkError> {
            self.writes.0.lock().unwrap().push(level);
            self.level = level;
            Ok(())
        }
    }

    fn setup() -> (Arc<InMemoryFlagClient>, LevelController, Arc<Writes>) {
        let client = Arc::new(InMemoryFlagClient::new());
        let writes = Arc::new(Writes::default());
        let logger = StructuredLogger::new(vec![Box::new(TestSink {
            level: LogLevel::Info,
            writes: writes.clone(),
        })]);
        let settings = shared_settings(FlagSettings {
            base_url: "https://acme.example.com".into(),
            ..FlagSettings::default()
        });
        let controller = LevelController::new(client.clone(), logger, settings);
        (client, controller, writes)
    }

    fn serve(client: &InMemoryFlagClient, payload: &str) {
        client.set_flag("log-level", true, Some(Variant::with_payload("default", payload)));
    }

    #[test]
    fn test_starts_at_fallback() {
        let (_, controller, writes) = setup();
        assert_eq!(controller.current_level(), LogLevel::Info);
        assert_eq!(controller.subscription(), Subscription::Uninitialized);
        assert!(writes.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_change_applied_once() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"global":"debug"}"#);

        let transition = controller.on_flag_event();
        assert_eq!(
            transition,
            Some(LevelTransition { from: LogLevel::Info, to: LogLevel::Debug })
        );
        assert_eq!(controller.current_level(), LogLevel::Debug);

        assert_eq!(controller.on_flag_event(), None);
        assert_eq!(*writes.0.lock().unwrap(), vec![LogLevel::Debug]);
    }

    #[test]
    fn test_resolving_to_current_level_is_noop() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"global":"INFO"}"#);

        assert_eq!(controller.on_flag_event(), None);
        assert!(writes.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_disabling_flag_returns_to_fallback() {
        let (client, mut controller, _) = setup();
        serve(&client, r#"{"global":"silly"}"#);
        controller.on_flag_event();

        client.set_flag("log-level", false, None);
        let transition = controller.on_flag_event().unwrap();
        assert_eq!(transition.to, LogLevel::Info);
    }

    #[test]
    fn test_disabled_flag_falls_back_without_tenant() {
        let (client, mut controller, _) = setup();
        serve(&client, r#"{"global":"debug"}"#);
        controller.on_flag_event();

        controller.settings.store(Arc::new(FlagSettings {
            base_url: "not a url".into(),
            ..FlagSettings::default()
        }));
        client.set_flag("log-level", false, None);

        assert_eq!(
            controller.on_flag_event(),
            Some(LevelTransition { from: LogLevel::Debug, to: LogLevel::Info })
        );
    }

    #[test]
    fn test_unusable_base_url_keeps_current_level_when_enabled() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"global":"debug"}"#);
        controller.on_flag_event();

        controller.settings.store(Arc::new(FlagSettings {
            base_url: "not a url".into(),
            ..FlagSettings::default()
        }));
        serve(&client, r#"{"global":"error"}"#);

        assert_eq!(controller.on_flag_event(), None);
        assert_eq!(controller.current_level(), LogLevel::Debug);
        assert_eq!(*writes.0.lock().unwrap(), vec![LogLevel::Debug]);
    }

    #[test]
    fn test_colliding_payload_keys_are_stable() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"Global":"debug","global":"error"}"#);

        assert_eq!(controller.on_flag_event().map(|t| t.to), Some(LogLevel::Error));
        for _ in 0..20 {
            assert_eq!(controller.on_flag_event(), None);
        }
        assert_eq!(*writes.0.lock().unwrap(), vec![LogLevel::Error]);
    }

    #[test]
    fn test_client_failure_keeps_current_level() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"global":"warn"}"#);
        controller.on_flag_event();

        client.fail_queries(Some("unavailable"));
        assert_eq!(controller.on_flag_event(), None);
        assert_eq!(controller.current_level(), LogLevel::Warn);
        assert_eq!(writes.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_changed_before_sync_is_ignored() {
        let (client, mut controller, writes) = setup();
        serve(&client, r#"{"global":"debug"}"#);

        assert_eq!(controller.handle_event(FlagEvent::Changed), None);
        assert!(writes.0.lock().unwrap().is_empty());

        assert!(controller.handle_event(FlagEvent::Synchronized).is_some());
        assert!(controller.subscription().is_armed());
    }

    #[test]
    fn test_base_url_rebinds_on_settings_swap() {
        let (client, mut controller, _) = setup();
        client.set_flag(
            "log-level",
            true,
            Some(Variant::with_payload("beta.example.com", r#"{"global":"debug"}"#)),
        );
        assert_eq!(controller.on_flag_event(), None);

        controller.settings.store(Arc::new(FlagSettings {
            base_url: "https://beta.example.com".into(),
            ..FlagSettings::default()
        }));
        assert_eq!(controller.on_flag_event().map(|t| t.to), Some(LogLevel::Debug));
    }
}
