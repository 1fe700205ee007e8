//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use flaglevel::config::{shared_settings, FlagSettings, SharedFlagSettings};
use flaglevel::observability::{LevelSink, SinkError, StructuredLogger};
use flaglevel::LogLevel;

/// Every level a sink was set to, in order.
#[derive(Clone, Default)]
pub struct SinkLog(Arc<Mutex<Vec<(String, LogLevel)>>>);

impl SinkLog {
    #[allow(dead_code)]
    pub fn writes(&self) -> Vec<(String, LogLevel)> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// A sink that records every level change.
pub struct RecordingSink {
    name: String,
    level: LogLevel,
    log: SinkLog,
    fail: bool,
}

impl RecordingSink {
    pub fn new(name: &str, level: LogLevel, log: &SinkLog) -> Self {
        Self {
            name: name.to_string(),
            level,
            log: log.clone(),
            fail: false,
        }
    }

    #[allow(dead_code)]
    pub fn failing(name: &str, level: LogLevel, log: &SinkLog) -> Self {
        Self {
            fail: true,
            ..Self::new(name, level, log)
        }
    }
}

impl LevelSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn level(&self) -> LogLevel {
        self.level
    }

    fn set_level(&mut self, level: LogLevel) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError {
                sink: self.name.clone(),
                detail: "sink closed".into(),
            });
        }
        self.log.0.lock().unwrap().push((self.name.clone(), level));
        self.level = level;
        Ok(())
    }
}

/// A logger with `console` and `file` recording sinks at `info`.
pub fn recording_logger() -> (StructuredLogger, SinkLog) {
    let log = SinkLog::default();
    let logger = StructuredLogger::new(vec![
        Box::new(RecordingSink::new("console", LogLevel::Info, &log)),
        Box::new(RecordingSink::new("file", LogLevel::Info, &log)),
    ]);
    (logger, log)
}

/// Settings for tenant `acme.example.com` with default variant `default`.
#[allow(dead_code)]
pub fn acme_settings() -> SharedFlagSettings {
    shared_settings(FlagSettings {
        flag_name: "log-level".into(),
        base_url: "https://acme.example.com".into(),
        global_log_level_key: "global".into(),
        default_variant_name: "default".into(),
        fallback_level: LogLevel::Info,
    })
}
