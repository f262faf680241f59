//! Immutable client settings.
//!
//! [`Settings`] is resolved once, validated, and then shared read-only by a
//! client for its whole lifetime. Build it with [`Settings::builder`] or load
//! it through [`ConfigLoader`](crate::ConfigLoader).

use std::collections::BTreeSet;
use std::time::Duration;

use http::Uri;
use indexmap::IndexMap;

use crate::layer::SettingsLayer;
use crate::loader::ConfigLoader;
use crate::ConfigError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default overall deadline for one logical call.
pub const DEFAULT_MAX_RESPONSE_TIME: Duration = Duration::from_secs(5);

/// Default number of extra attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff base delay.
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_millis(500);

/// Default statuses that trigger a retry.
pub const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "BERAPI";

/// Client configuration.
///
/// # Example
///
/// ```
/// use berapi_config::Settings;
/// use std::time::Duration;
///
/// let settings = Settings::builder()
///     .without_env()
///     .base_url("https://api.example.com")
///     .header("Accept", "application/json")
///     .timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
///
/// assert_eq!(settings.base_url(), Some("https://api.example.com"));
/// assert_eq!(settings.timeout(), Duration::from_secs(2));
/// assert!(!settings.retry().enabled());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    base_url: Option<String>,
    headers: IndexMap<String, String>,
    timeout: Duration,
    max_response_time: Duration,
    retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: IndexMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_response_time: DEFAULT_MAX_RESPONSE_TIME,
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    /// Creates a builder that starts from the defaults and reads
    /// `BERAPI__*` environment overrides on [`build`](SettingsBuilder::build).
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Resolves settings from the defaults and the `BERAPI__*` environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the result
    /// is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Base url joined with relative request paths.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Default headers added to every request, in insertion order.
    #[must_use]
    pub const fn headers(&self) -> &IndexMap<String, String> {
        &self.headers
    }

    /// Per-attempt transport timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Overall deadline for one logical call, retries included.
    #[must_use]
    pub const fn max_response_time(&self) -> Duration {
        self.max_response_time
    }

    /// Retry configuration.
    #[must_use]
    pub const fn retry(&self) -> &RetrySettings {
        &self.retry
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `base_url` is not absolute
    /// - a timeout is zero
    /// - a retry status is outside `100..=599`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base_url) = &self.base_url {
            let uri: Uri = base_url
                .parse()
                .map_err(|e| ConfigError::invalid_value("base_url", format!("{e}")))?;
            if uri.scheme().is_none() || uri.authority().is_none() {
                return Err(ConfigError::invalid_value(
                    "base_url",
                    format!("'{base_url}' must include a scheme and host"),
                ));
            }
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::invalid_value("timeout", "must be greater than zero"));
        }

        if self.max_response_time.is_zero() {
            return Err(ConfigError::invalid_value(
                "max_response_time",
                "must be greater than zero",
            ));
        }

        if let Some(status) = self
            .retry
            .retry_statuses
            .iter()
            .find(|status| !(100..=599).contains(*status))
        {
            return Err(ConfigError::invalid_value(
                "retry.retry_statuses",
                format!("{status} is not a valid HTTP status"),
            ));
        }

        Ok(())
    }

    // Applies a fully merged layer on top of the defaults.
    pub(crate) fn from_layer(layer: SettingsLayer) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(base_url) = layer.base_url {
            settings.base_url = Some(base_url);
        }
        if let Some(headers) = layer.headers {
            settings.headers = headers;
        }
        if let Some(secs) = layer.timeout {
            settings.timeout = seconds("timeout", secs)?;
        }
        if let Some(secs) = layer.max_response_time {
            settings.max_response_time = seconds("max_response_time", secs)?;
        }

        let retry = layer.retry;
        if let Some(enabled) = retry.enabled {
            settings.retry.enabled = enabled;
        }
        if let Some(max_retries) = retry.max_retries {
            settings.retry.max_retries = max_retries;
        }
        if let Some(secs) = retry.backoff_factor {
            settings.retry.backoff_factor = seconds("retry.backoff_factor", secs)?;
        }
        if let Some(statuses) = retry.retry_statuses {
            settings.retry.retry_statuses = statuses;
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    enabled: bool,
    max_retries: u32,
    backoff_factor: Duration,
    retry_statuses: BTreeSet<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            retry_statuses: DEFAULT_RETRY_STATUSES.into_iter().collect(),
        }
    }
}

impl RetrySettings {
    /// Whether failed attempts are retried at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Extra attempts allowed after the original one.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base delay; the wait before retry `k` is `backoff_factor * 2^(k-1)`.
    #[must_use]
    pub const fn backoff_factor(&self) -> Duration {
        self.backoff_factor
    }

    /// Response statuses that make an attempt retry-eligible.
    #[must_use]
    pub const fn retry_statuses(&self) -> &BTreeSet<u16> {
        &self.retry_statuses
    }

    /// Returns true if `status` is retry-eligible.
    #[must_use]
    pub fn is_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Builder for [`Settings`].
///
/// Explicit values set here win over environment overrides, which win over
/// the defaults.
#[derive(Debug)]
#[must_use]
pub struct SettingsBuilder {
    loader: ConfigLoader,
    explicit: SettingsLayer,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBuilder {
    /// Creates a builder reading the `BERAPI__*` environment.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_env_prefix(DEFAULT_ENV_PREFIX),
            explicit: SettingsLayer::default(),
        }
    }

    /// Starts from a configured loader instead of the bare defaults.
    pub fn from_loader(loader: ConfigLoader) -> Self {
        Self {
            loader,
            explicit: SettingsLayer::default(),
        }
    }

    /// Reads overrides from `PREFIX__*` instead of `BERAPI__*`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.loader = self.loader.with_env_prefix(prefix);
        self
    }

    /// Ignores the process environment.
    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    pub fn env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.loader = self.loader.with_env_vars(vars);
        self
    }

    /// Sets the base url.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.explicit.base_url = Some(base_url.into());
        self
    }

    /// Adds a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.explicit
            .headers
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.explicit.timeout = Some(timeout.as_secs_f64());
        self
    }

    /// Sets the overall deadline.
    pub fn max_response_time(mut self, max_response_time: Duration) -> Self {
        self.explicit.max_response_time = Some(max_response_time.as_secs_f64());
        self
    }

    /// Enables or disables retries.
    pub fn retry_enabled(mut self, enabled: bool) -> Self {
        self.explicit.retry.enabled = Some(enabled);
        self
    }

    /// Sets the number of extra attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.explicit.retry.max_retries = Some(max_retries);
        self
    }

    /// Sets the backoff base delay.
    pub fn backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.explicit.retry.backoff_factor = Some(backoff_factor.as_secs_f64());
        self
    }

    /// Replaces the retry-eligible statuses.
    pub fn retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.explicit.retry.retry_statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Resolves and validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment override cannot be parsed or
    /// the resolved settings fail [`Settings::validate`].
    pub fn build(self) -> Result<Settings, ConfigError> {
        self.loader.with_overrides(self.explicit).load()
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::invalid_value(field, format!("{secs} is not a non-negative number of seconds"))
    })
}
