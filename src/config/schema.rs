//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file, and every section has defaults so a minimal file only names the
//! flag and the base URL.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::level::LogLevel;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Which flag drives the log level and how its variants are matched.
    pub flag: FlagSettings,

    /// Logger sinks and output format.
    pub logging: LoggingConfig,

    /// Where flag state is read from.
    pub flag_source: FlagSourceConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,
}

/// Flag resolution settings.
///
/// These are re-read on every resolution, so a config reload rebinds variant
/// matching to the latest base URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagSettings {
    /// Name of the feature flag.
    pub flag_name: String,

    /// Absolute URL of this tenant. Only the hostname is used.
    pub base_url: String,

    /// Key inside the variant payload holding the level.
    pub global_log_level_key: String,

    /// Variant name honored in addition to the tenant hostname.
    pub default_variant_name: String,

    /// Level used whenever the flag does not yield a valid one.
    pub fallback_level: LogLevel,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            flag_name: "log-level".to_string(),
            base_url: "http://localhost".to_string(),
            global_log_level_key: "global".to_string(),
            default_variant_name: "default".to_string(),
            fallback_level: LogLevel::Info,
        }
    }
}

/// Output format of every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// Append logs to this file as a second sink.
    pub file_path: Option<PathBuf>,
}

/// Flags file settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FlagSourceConfig {
    /// Path to the TOML flags file.
    pub path: PathBuf,

    /// Poll interval for the file watcher in seconds.
    pub poll_interval_secs: u64,
}

impl Default for FlagSourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("flags.toml"),
            poll_interval_secs: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
