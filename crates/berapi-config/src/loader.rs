//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading [`Settings`] from
//! multiple sources: defaults, files, environment variables and explicit
//! overrides.

use std::env;
use std::fs;
use std::path::Path;

use crate::layer::SettingsLayer;
use crate::{ConfigError, Settings};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration files (TOML or JSON), in the order they were added
/// 3. Environment variables
/// 4. Explicit overrides
///
/// # Example
///
/// ```no_run
/// use berapi_config::ConfigLoader;
///
/// # fn main() -> Result<(), berapi_config::ConfigError> {
/// let settings = ConfigLoader::new()
///     .with_optional_file("berapi.toml")?
///     .with_env_prefix("BERAPI")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    files: SettingsLayer,
    env: EnvSource,
    overrides: SettingsLayer,
}

#[derive(Debug, Default)]
enum EnvSource {
    #[default]
    Disabled,
    Process {
        prefix: String,
    },
    Vars {
        prefix: String,
        vars: Vec<(String, String)>,
    },
}

impl ConfigLoader {
    /// Create a new configuration loader with no environment overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen from the extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON or unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let layer = Self::parse_file(&content, path)?;
        self.files.merge(layer);

        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// # Arguments
    ///
    /// * `content` - Configuration content as a string
    /// * `format` - File format ("toml" or "json")
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use berapi_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new()
    ///     .with_string(r#"base_url = "https://api.example.com""#, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(settings.base_url(), Some("https://api.example.com"));
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };

        self.files.merge(layer);
        Ok(self)
    }

    /// Read overrides from process environment variables named
    /// `PREFIX__KEY` or `PREFIX__SECTION__KEY`, e.g.
    /// `BERAPI__RETRY__MAX_RETRIES=5`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        let prefix = prefix.to_uppercase();
        self.env = match self.env {
            EnvSource::Vars { vars, .. } => EnvSource::Vars { prefix, vars },
            _ => EnvSource::Process { prefix },
        };
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    ///
    /// Keeps the current prefix, or uses `BERAPI` if none was set.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = match self.env {
            EnvSource::Process { prefix } | EnvSource::Vars { prefix, .. } => prefix,
            EnvSource::Disabled => crate::settings::DEFAULT_ENV_PREFIX.to_string(),
        };
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.env = EnvSource::Vars { prefix, vars };
        self
    }

    /// Skip environment overrides.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.env = EnvSource::Disabled;
        self
    }

    /// Load a `.env` file into the process environment.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::env_parse_error(".env", e.to_string())),
        }
    }

    /// Apply explicit values on top of every other source.
    #[must_use]
    pub fn with_overrides(mut self, overrides: SettingsLayer) -> Self {
        self.overrides.merge(overrides);
        self
    }

    /// Finalize and return the settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - The resolved settings are invalid
    pub fn load(self) -> Result<Settings, ConfigError> {
        let mut layer = self.files;

        let env_layer = match self.env {
            EnvSource::Disabled => None,
            EnvSource::Process { prefix } => Some(SettingsLayer::from_env_vars(&prefix, env::vars())?),
            EnvSource::Vars { prefix, vars } => Some(SettingsLayer::from_env_vars(&prefix, vars)?),
        };
        if let Some(env_layer) = env_layer {
            layer.merge(env_layer);
        }

        layer.merge(self.overrides);
        Settings::from_layer(layer)
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<SettingsLayer, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_loader_new() {
        let settings = ConfigLoader::new().load().unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            base_url = "https://api.example.com"
            timeout = 1.5

            [headers]
            Accept = "application/json"

            [retry]
            enabled = true
            max_retries = 2
        "#;

        let settings = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(settings.base_url(), Some("https://api.example.com"));
        assert_eq!(settings.timeout(), Duration::from_millis(1500));
        assert_eq!(
            settings.headers().get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert!(settings.retry().enabled());
        assert_eq!(settings.retry().max_retries(), 2);
        // untouched fields keep their defaults
        assert_eq!(settings.max_response_time(), Duration::from_secs(5));
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"retry": {"backoff_factor": 0.2, "retry_statuses": [500]}}"#;

        let settings = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(settings.retry().backoff_factor(), Duration::from_millis(200));
        assert!(settings.retry().is_retry_status(500));
        assert!(!settings.retry().is_retry_status(503));
    }

    #[test]
    fn test_loader_unsupported_format() {
        let result = ConfigLoader::new().with_string("a: 1", "yaml");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_response_time = 12").unwrap();

        let settings = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(settings.max_response_time(), Duration::from_secs(12));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/berapi.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let settings = ConfigLoader::new()
            .with_optional_file("/nonexistent/berapi.toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_loader_precedence() {
        let settings = ConfigLoader::new()
            .with_string("timeout = 9\nmax_response_time = 20", "toml")
            .unwrap()
            .with_env_vars([("BERAPI__TIMEOUT", "4"), ("BERAPI__MAX_RESPONSE_TIME", "15")])
            .with_overrides(SettingsLayer {
                timeout: Some(2.0),
                ..SettingsLayer::default()
            })
            .load()
            .unwrap();

        // explicit > env > file
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert_eq!(settings.max_response_time(), Duration::from_secs(15));
    }

    #[test]
    fn test_loader_without_env_ignores_vars() {
        let settings = ConfigLoader::new()
            .with_env_vars([("BERAPI__TIMEOUT", "4")])
            .without_env()
            .load()
            .unwrap();

        assert_eq!(settings.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_loader_negative_backoff_rejected() {
        let result = ConfigLoader::new()
            .with_string("[retry]\nbackoff_factor = -1.0", "toml")
            .unwrap()
            .load();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
