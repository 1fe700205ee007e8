//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → FlagSettings published through ArcSwap to the level controller
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<FlagSettings>
//!     → next resolution uses the new settings
//! ```
//!
//! Only the `[flag]` section is hot-reloaded. Sinks, the flags file location
//! and metrics are fixed at startup.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use loader::{load_config, ConfigError};
pub use schema::{AppConfig, FlagSettings, LogFormat, LoggingConfig};
pub use watcher::ConfigWatcher;

/// Flag settings shared between the config watcher and the level controller.
pub type SharedFlagSettings = Arc<ArcSwap<FlagSettings>>;

pub fn shared_settings(settings: FlagSettings) -> SharedFlagSettings {
    Arc::new(ArcSwap::from_pointee(settings))
}
