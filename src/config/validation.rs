//! Configuration validation.
//!
//! Serde handles syntax; this module checks values. All errors are
//! collected rather than stopping at the first one.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::resolver::TenantContext;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("flag.base_url is unusable: {0}")]
    BaseUrl(String),

    #[error("flag_source.poll_interval_secs must be greater than zero")]
    ZeroPollInterval,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let flag = &config.flag;

    let required = [
        ("flag.flag_name", &flag.flag_name),
        ("flag.global_log_level_key", &flag.global_log_level_key),
        ("flag.default_variant_name", &flag.default_variant_name),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Empty(field));
        }
    }

    if let Err(e) = TenantContext::from_base_url(&flag.base_url, &flag.default_variant_name) {
        errors.push(ValidationError::BaseUrl(e.to_string()));
    }

    if config.flag_source.path.as_os_str().is_empty() {
        errors.push(ValidationError::Empty("flag_source.path"));
    }
    if config.flag_source.poll_interval_secs == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
