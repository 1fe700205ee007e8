//! Runtime log level control driven by a feature flag.

pub mod config;
pub mod controller;
pub mod flag;
pub mod level;
pub mod lifecycle;
pub mod observability;
pub mod resolver;

pub use config::schema::AppConfig;
pub use controller::{LevelController, LevelTransition};
pub use flag::{FlagClient, FlagEvent, Variant};
pub use level::LogLevel;
pub use observability::StructuredLogger;
