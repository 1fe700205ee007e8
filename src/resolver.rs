//! Log level resolution from flag state.
//!
//! # Responsibilities
//! - Decide whether the served variant applies to this tenant
//! - Parse and normalize the variant payload
//! - Validate the requested level against the level set
//!
//! Every failed precondition resolves to the caller's fallback level.
//! Nothing in here performs I/O or returns an error to the caller.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::flag::Variant;
use crate::level::LogLevel;

/// Lowercase and trim.
fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Errors deriving a tenant context.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url {0:?} has no host")]
    MissingHost(String),
}

/// The variant names this process is willing to honor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    hostname: String,
    default_variant: String,
}

impl TenantContext {
    /// Derive the context from the base URL's hostname and the default variant name.
    pub fn from_base_url(base_url: &str, default_variant: &str) -> Result<Self, TenantError> {
        let url = Url::parse(base_url).map_err(|source| TenantError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let hostname = url
            .host_str()
            .map(normalize)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TenantError::MissingHost(base_url.to_string()))?;

        Ok(Self {
            hostname,
            default_variant: normalize(default_variant),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Case- and whitespace-insensitive membership test.
    pub fn accepts(&self, variant_name: &str) -> bool {
        let name = normalize(variant_name);
        !name.is_empty() && (name == self.hostname || name == self.default_variant)
    }
}

/// Variant payload with every key and value lowercased and trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelConfig {
    entries: HashMap<String, String>,
}

impl LevelConfig {
    /// Parse a payload that must be a JSON object of string values.
    ///
    /// Keys that collide after normalization keep the value that appears
    /// last in the document.
    pub fn parse(payload: &str) -> Result<Self, Rejection> {
        let raw: Map<String, Value> =
            serde_json::from_str(payload).map_err(|e| Rejection::MalformedPayload(e.to_string()))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            match value {
                Value::String(value) => entries.push((key, value)),
                other => {
                    return Err(Rejection::MalformedPayload(format!(
                        "value for {key:?} is not a string: {other}"
                    )))
                }
            }
        }
        Ok(Self::from_entries(entries))
    }

    /// Build from key/value pairs, later pairs overriding earlier ones.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (normalize(k.as_ref()), normalize(v.as_ref())))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize(key)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Why a resolution fell back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("flag disabled")]
    FlagDisabled,

    #[error("no usable variant served")]
    VariantUnavailable,

    #[error("variant {0:?} is not for this tenant")]
    TenantMismatch(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("payload has no value for key {0:?}")]
    MissingLevelKey(String),

    #[error("unknown level {0:?}")]
    UnknownLevel(String),
}

/// Inputs to a single resolution.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub flag_enabled: bool,
    pub variant: &'a Variant,
    pub tenant: &'a TenantContext,
    pub level_key: &'a str,
}

/// Run the resolution steps, reporting which precondition failed.
pub fn evaluate(input: &Resolution<'_>) -> Result<LogLevel, Rejection> {
    if !input.flag_enabled {
        return Err(Rejection::FlagDisabled);
    }

    let variant = input.variant;
    let (name, payload) = match (&variant.name, &variant.payload) {
        (Some(name), Some(payload)) if variant.enabled && !name.trim().is_empty() => {
            (name, payload)
        }
        _ => return Err(Rejection::VariantUnavailable),
    };

    if !input.tenant.accepts(name) {
        return Err(Rejection::TenantMismatch(name.clone()));
    }

    let config = LevelConfig::parse(&payload.value)?;

    let value = config
        .get(input.level_key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Rejection::MissingLevelKey(input.level_key.to_string()))?;

    value
        .parse()
        .map_err(|_| Rejection::UnknownLevel(value.to_string()))
}

/// Resolve the level to apply, falling back on any failed precondition.
pub fn resolve(input: &Resolution<'_>, fallback: LogLevel) -> LogLevel {
    match evaluate(input) {
        Ok(level) => level,
        Err(rejection) => {
            tracing::debug!(%rejection, %fallback, "Using fallback log level");
            fallback
        }
    }
}
