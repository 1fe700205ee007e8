//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Build one formatting layer per configured sink
//! - Hand back the sinks' reload handles as a [`StructuredLogger`]
//!
//! Every sink layer sits behind its own `reload::Layer<LevelFilter, _>`, so
//! the level controller can change thresholds without rebuilding the
//! subscriber.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, reload, Registry};

use crate::config::schema::{LogFormat, LoggingConfig};
use crate::level::LogLevel;
use crate::observability::sink::{LevelSink, ReloadSink, StructuredLogger};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;
type FmtLayer<W> = fmt::Layer<Registry, fmt::format::DefaultFields, fmt::format::Format, W>;

/// Errors raised while initializing logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("global subscriber already set: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Build the sink layers without installing them.
///
/// Returns the composed layers and the matching sinks, all starting at `initial`.
pub fn build_layers(
    config: &LoggingConfig,
    initial: LogLevel,
) -> Result<(Vec<BoxedLayer>, StructuredLogger), LoggingError> {
    let mut layers = Vec::new();
    let mut sinks: Vec<Box<dyn LevelSink>> = Vec::new();

    let console = format_layer(config.format, fmt::layer().with_writer(io::stdout));
    let (layer, sink) = with_reload("console", console, initial);
    layers.push(layer);
    sinks.push(Box::new(sink));

    if let Some(path) = &config.file_path {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| LoggingError::File {
                path: path.clone(),
                source,
            })?;
        let writer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
        let (layer, sink) = with_reload("file", format_layer(config.format, writer), initial);
        layers.push(layer);
        sinks.push(Box::new(sink));
    }

    Ok((layers, StructuredLogger::new(sinks)))
}

/// Install the global subscriber and return its sinks.
pub fn init(config: &LoggingConfig, initial: LogLevel) -> Result<StructuredLogger, LoggingError> {
    let (layers, logger) = build_layers(config, initial)?;
    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(logger)
}

fn format_layer<W>(format: LogFormat, layer: FmtLayer<W>) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn with_reload(name: &str, layer: BoxedLayer, initial: LogLevel) -> (BoxedLayer, ReloadSink) {
    let (filter, handle) = reload::Layer::<LevelFilter, Registry>::new(initial.as_level_filter());
    let sink = ReloadSink::new(name, initial, handle);
    (layer.with_filter(filter).boxed(), sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_only_by_default() {
        let config = LoggingConfig::default();
        let (layers, logger) = build_layers(&config, LogLevel::Info).unwrap();

        assert_eq!(layers.len(), 1);
        let names: Vec<_> = logger.sinks().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["console"]);
    }

    #[test]
    fn test_file_sink_added() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_path: Some(dir.path().join("app.log")),
            ..LoggingConfig::default()
        };
        let (layers, logger) = build_layers(&config, LogLevel::Warn).unwrap();

        assert_eq!(layers.len(), 2);
        assert!(logger.sinks().all(|s| s.level() == LogLevel::Warn));
    }

    #[test]
    fn test_unwritable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file_path: Some(dir.path().join("missing").join("app.log")),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            build_layers(&config, LogLevel::Info),
            Err(LoggingError::File { .. })
        ));
    }
}
