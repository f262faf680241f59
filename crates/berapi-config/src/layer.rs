//! Partial settings used while merging configuration sources.
//!
//! Every field is optional; a later layer only overrides the fields it sets.
//! Durations are stored as seconds so files and environment variables can
//! write `timeout = 1.5`.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One source of settings: a file, the environment or explicit values.
///
/// # Example
///
/// ```
/// use berapi_config::SettingsLayer;
///
/// let layer: SettingsLayer = toml::from_str(r#"
///     base_url = "https://api.example.com"
///     timeout = 1.5
///
///     [retry]
///     enabled = true
///     retry_statuses = [503]
/// "#).unwrap();
///
/// assert_eq!(layer.timeout, Some(1.5));
/// assert_eq!(layer.retry.enabled, Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    /// Base url.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Default headers.
    #[serde(default)]
    pub headers: Option<IndexMap<String, String>>,

    /// Per-attempt timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Overall deadline in seconds.
    #[serde(default)]
    pub max_response_time: Option<f64>,

    /// Retry section.
    #[serde(default)]
    pub retry: RetryLayer,
}

/// The `[retry]` section of a [`SettingsLayer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryLayer {
    /// Whether retries are enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Extra attempts after the original one.
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Backoff base delay in seconds.
    #[serde(default)]
    pub backoff_factor: Option<f64>,

    /// Retry-eligible statuses.
    #[serde(default)]
    pub retry_statuses: Option<BTreeSet<u16>>,
}

impl SettingsLayer {
    /// Overlays `other` onto `self`. Fields set in `other` win; headers are
    /// merged key by key.
    pub fn merge(&mut self, other: Self) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if let Some(headers) = other.headers {
            self.headers
                .get_or_insert_with(IndexMap::new)
                .extend(headers);
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        if other.max_response_time.is_some() {
            self.max_response_time = other.max_response_time;
        }

        let retry = other.retry;
        if retry.enabled.is_some() {
            self.retry.enabled = retry.enabled;
        }
        if retry.max_retries.is_some() {
            self.retry.max_retries = retry.max_retries;
        }
        if retry.backoff_factor.is_some() {
            self.retry.backoff_factor = retry.backoff_factor;
        }
        if retry.retry_statuses.is_some() {
            self.retry.retry_statuses = retry.retry_statuses;
        }
    }

    /// Builds a layer from `PREFIX__KEY` variables.
    ///
    /// Variables that do not start with `PREFIX__` are ignored, as are
    /// unknown keys under the prefix.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EnvParseError` if a known variable has a value
    /// of the wrong type.
    pub fn from_env_vars<I, K, V>(prefix: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Self::default();
        let prefix = format!("{}__", prefix.to_uppercase());

        for (key, value) in vars {
            let key = key.as_ref();
            if let Some(rest) = key.strip_prefix(&prefix) {
                layer.apply_env_var(key, rest, value.as_ref())?;
            }
        }

        Ok(layer)
    }

    fn apply_env_var(&mut self, key: &str, rest: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = rest.split("__").collect();

        match parts.as_slice() {
            ["BASE_URL"] => {
                self.base_url = Some(value.to_string());
            }
            ["HEADERS"] => {
                let headers: IndexMap<String, String> = serde_json::from_str(value)
                    .map_err(|_| ConfigError::env_parse_error(key, "expected JSON object of strings"))?;
                self.headers = Some(headers);
            }
            ["TIMEOUT"] => {
                self.timeout = Some(parse_seconds(key, value)?);
            }
            ["MAX_RESPONSE_TIME"] => {
                self.max_response_time = Some(parse_seconds(key, value)?);
            }
            ["RETRY", "ENABLED"] => {
                self.retry.enabled = Some(
                    parse_bool(value)
                        .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?,
                );
            }
            ["RETRY", "MAX_RETRIES"] => {
                self.retry.max_retries = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?,
                );
            }
            ["RETRY", "BACKOFF_FACTOR"] => {
                self.retry.backoff_factor = Some(parse_seconds(key, value)?);
            }
            ["RETRY", "RETRY_STATUSES"] => {
                let statuses = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<u16>().map_err(|_| {
                            ConfigError::env_parse_error(key, "expected comma-separated status codes")
                        })
                    })
                    .collect::<Result<BTreeSet<_>, _>>()?;
                self.retry.retry_statuses = Some(statuses);
            }
            _ => {
                // Unknown key, ignore
            }
        }

        Ok(())
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected number of seconds"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
