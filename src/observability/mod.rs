//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! logging.rs builds the tracing subscriber:
//!     registry
//!       → console fmt layer  ← reload filter ← ReloadSink "console"
//!       → file fmt layer     ← reload filter ← ReloadSink "file" (optional)
//!
//! sink.rs groups the sinks into a StructuredLogger
//!     → owned by the level controller, the only writer of sink levels
//!
//! metrics.rs records controller activity
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
pub mod sink;

pub use sink::{LevelSink, SinkError, StructuredLogger};
