//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Metrics → flag client → level controller task → initial flags load
//!     → flags watcher → config watcher
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → controller and reload tasks exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! The controller subscribes to flag events before the first flags load so
//! the one-time `Synchronized` event cannot be missed.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, Service, StartupError};
