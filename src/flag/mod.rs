//! Feature-flag client abstraction.
//!
//! # Data Flow
//! ```text
//! flag source (in-memory, flags file)
//!     → snapshot of flag state
//!     → FlagEvent::Synchronized (first load)
//!     → FlagEvent::Changed (every later delta)
//!     → broadcast to subscribers (the level controller)
//! ```
//!
//! The controller only ever sees the [`FlagClient`] trait; the wire protocol
//! of a real flag service is out of scope.

pub mod file;
pub mod memory;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use file::FileFlagClient;
pub use memory::InMemoryFlagClient;

/// Capacity of the lifecycle event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle notifications emitted by a flag client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEvent {
    /// Initial state has been loaded. Fires once.
    Synchronized,
    /// Flag state changed after the initial sync.
    Changed,
}

impl FlagEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagEvent::Synchronized => "synchronized",
            FlagEvent::Changed => "changed",
        }
    }
}

/// Opaque payload attached to a variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Payload {
    /// Expected to hold a JSON object, but nothing here enforces that.
    pub value: String,
}

/// The variant served for a flag in the current evaluation context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Variant {
    /// Which variant matched. `None` when no variant was served.
    pub name: Option<String>,
    /// False when no variant matched.
    pub enabled: bool,
    pub payload: Option<Payload>,
}

impl Variant {
    /// The value a client returns when it has no variant for a flag.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// An enabled variant carrying `payload` as its JSON value.
    pub fn with_payload(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            enabled: true,
            payload: Some(Payload {
                value: payload.into(),
            }),
        }
    }
}

/// State of a single flag as held by a client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagState {
    pub enabled: bool,
    /// `None` is served as [`Variant::disabled`].
    pub variant: Option<Variant>,
}

/// Point-in-time state of every flag a client knows about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagSnapshot {
    pub flags: HashMap<String, FlagState>,
}

impl FlagSnapshot {
    /// Unknown flags are disabled.
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).is_some_and(|state| state.enabled)
    }

    pub fn variant(&self, flag: &str) -> Variant {
        self.flags
            .get(flag)
            .and_then(|state| state.variant.clone())
            .unwrap_or_else(Variant::disabled)
    }
}

/// Errors raised while querying a flag client.
#[derive(Debug, Error)]
pub enum FlagClientError {
    /// The client has not loaded any state yet.
    #[error("flag client not ready")]
    NotReady,

    /// The client could not answer the query.
    #[error("flag query failed: {0}")]
    Query(String),
}

/// The interface the level controller needs from a feature-flag client.
pub trait FlagClient: Send + Sync {
    /// Whether `flag` is enabled for this process.
    fn is_enabled(&self, flag: &str) -> Result<bool, FlagClientError>;

    /// The variant served for `flag`.
    fn get_variant(&self, flag: &str) -> Result<Variant, FlagClientError>;

    /// Receive lifecycle notifications emitted after this call.
    fn subscribe(&self) -> broadcast::Receiver<FlagEvent>;
}
