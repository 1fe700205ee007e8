//! In-process flag client.
//!
//! State is set directly by the embedding code and lifecycle events are
//! emitted on demand, which makes this client suitable both for wiring a
//! flag source that lives elsewhere in the process and for tests.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use tokio::sync::broadcast;

use crate::flag::{
    FlagClient, FlagClientError, FlagEvent, FlagSnapshot, FlagState, Variant,
    EVENT_CHANNEL_CAPACITY,
};

pub struct InMemoryFlagClient {
    snapshot: ArcSwap<FlagSnapshot>,
    /// When set, every query fails with this detail.
    failure: ArcSwapOption<String>,
    events: broadcast::Sender<FlagEvent>,
}

impl InMemoryFlagClient {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            snapshot: ArcSwap::from_pointee(FlagSnapshot::default()),
            failure: ArcSwapOption::empty(),
            events,
        }
    }

    /// Replace the state of `flag`.
    pub fn set_flag(&self, flag: &str, enabled: bool, variant: Option<Variant>) {
        let state = FlagState { enabled, variant };
        self.snapshot.rcu(|current| {
            let mut next = FlagSnapshot::clone(current);
            next.flags.insert(flag.to_string(), state.clone());
            next
        });
    }

    /// Drop `flag`; it then reads as disabled.
    pub fn remove_flag(&self, flag: &str) {
        self.snapshot.rcu(|current| {
            let mut next = FlagSnapshot::clone(current);
            next.flags.remove(flag);
            next
        });
    }

    /// Make every query fail with `detail`, or recover with `None`.
    pub fn fail_queries(&self, detail: Option<&str>) {
        self.failure.store(detail.map(|d| Arc::new(d.to_string())));
    }

    pub fn snapshot(&self) -> Arc<FlagSnapshot> {
        self.snapshot.load_full()
    }

    /// Emit [`FlagEvent::Synchronized`].
    pub fn synchronize(&self) {
        self.emit(FlagEvent::Synchronized);
    }

    /// Emit [`FlagEvent::Changed`].
    pub fn notify_changed(&self) {
        self.emit(FlagEvent::Changed);
    }

    fn emit(&self, event: FlagEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn check_failure(&self) -> Result<(), FlagClientError> {
        match self.failure.load_full() {
            Some(detail) => Err(FlagClientError::Query(detail.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryFlagClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagClient for InMemoryFlagClient {
    fn is_enabled(&self, flag: &str) -> Result<bool, FlagClientError> {
        self.check_failure()?;
        Ok(self.snapshot.load().is_enabled(flag))
    }

    fn get_variant(&self, flag: &str) -> Result<Variant, FlagClientError> {
        self.check_failure()?;
        Ok(self.snapshot.load().variant(flag))
    }

    fn subscribe(&self) -> broadcast::Receiver<FlagEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_flag_is_disabled() {
        let client = InMemoryFlagClient::new();
        assert!(!client.is_enabled("log-level").unwrap());
        assert_eq!(client.get_variant("log-level").unwrap(), Variant::disabled());
    }

    #[test]
    fn test_set_and_remove_flag() {
        let client = InMemoryFlagClient::new();
        let variant = Variant::with_payload("default", r#"{"global":"debug"}"#);
        client.set_flag("log-level", true, Some(variant.clone()));

        assert!(client.is_enabled("log-level").unwrap());
        assert_eq!(client.get_variant("log-level").unwrap(), variant);

        client.remove_flag("log-level");
        assert!(!client.is_enabled("log-level").unwrap());
    }

    #[test]
    fn test_injected_failure() {
        let client = InMemoryFlagClient::new();
        client.fail_queries(Some("connection reset"));
        let err = client.is_enabled("log-level").unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        client.fail_queries(None);
        assert!(client.is_enabled("log-level").is_ok());
    }

    #[test]
    fn test_events_reach_subscribers() {
        let client = InMemoryFlagClient::new();
        let mut rx = client.subscribe();
        client.synchronize();
        client.notify_changed();

        assert_eq!(rx.try_recv().unwrap(), FlagEvent::Synchronized);
        assert_eq!(rx.try_recv().unwrap(), FlagEvent::Changed);
    }
}
