//! Log sinks with independently settable levels.
//!
//! # Responsibilities
//! - Abstract a single output destination's severity threshold
//! - Group the process's sinks into one [`StructuredLogger`]
//!
//! The level controller owns the logger and is the only writer of sink
//! levels once attached.

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{reload, Registry};

use crate::level::LogLevel;

/// Errors raised while changing a sink's level.
#[derive(Debug, Error)]
#[error("failed to set level on sink {sink}: {detail}")]
pub struct SinkError {
    pub sink: String,
    pub detail: String,
}

/// An output destination whose severity threshold can be overridden.
pub trait LevelSink: Send {
    fn name(&self) -> &str;

    fn level(&self) -> LogLevel;

    fn set_level(&mut self, level: LogLevel) -> Result<(), SinkError>;
}

/// A sink backed by a reloadable per-layer filter of the global subscriber.
pub struct ReloadSink {
    name: String,
    level: LogLevel,
    handle: reload::Handle<LevelFilter, Registry>,
}

impl ReloadSink {
    pub fn new(
        name: impl Into<String>,
        level: LogLevel,
        handle: reload::Handle<LevelFilter, Registry>,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            handle,
        }
    }
}

impl LevelSink for ReloadSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn set_level(&mut self, level: LogLevel) -> Result<(), SinkError> {
        self.handle
            .reload(level.as_level_filter())
            .map_err(|e| SinkError {
                sink: self.name.clone(),
                detail: e.to_string(),
            })?;
        self.level = level;
        Ok(())
    }
}

/// The process logger as seen by the level controller: a fixed set of sinks.
#[derive(Default)]
pub struct StructuredLogger {
    sinks: Vec<Box<dyn LevelSink>>,
}

impl StructuredLogger {
    pub fn new(sinks: Vec<Box<dyn LevelSink>>) -> Self {
        Self { sinks }
    }

    pub fn sinks(&self) -> impl Iterator<Item = &(dyn LevelSink + 'static)> + '_ {
        self.sinks.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Set every sink to `level`.
    ///
    /// A failing sink does not stop the others from being updated; all
    /// failures are returned.
    pub fn set_level(&mut self, level: LogLevel) -> Result<(), Vec<SinkError>> {
        let errors: Vec<SinkError> = self
            .sinks
            .iter_mut()
            .filter_map(|sink| sink.set_level(level).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
