//! # berapi Config
//!
//! Immutable settings for the berapi client.
//!
//! ## Layers
//!
//! Settings are resolved from, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML/JSON configuration files ([`ConfigLoader::with_file`])
//! 3. Environment variables (`BERAPI__TIMEOUT`, `BERAPI__RETRY__ENABLED`, ...)
//! 4. Explicit builder values ([`SettingsBuilder`])
//!
//! ## Example
//!
//! ```
//! use berapi_config::Settings;
//! use std::time::Duration;
//!
//! let settings = Settings::builder()
//!     .env_vars([("BERAPI__RETRY__ENABLED", "true")])
//!     .max_retries(2)
//!     .build()
//!     .unwrap();
//!
//! assert!(settings.retry().enabled());
//! assert_eq!(settings.retry().max_retries(), 2);
//! assert_eq!(settings.timeout(), Duration::from_secs(3));
//! ```

#![doc(html_root_url = "https://docs.rs/berapi-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod layer;
mod loader;
mod settings;

pub use error::ConfigError;
pub use layer::{RetryLayer, SettingsLayer};
pub use loader::ConfigLoader;
pub use settings::{
    RetrySettings, Settings, SettingsBuilder, DEFAULT_BACKOFF_FACTOR, DEFAULT_ENV_PREFIX,
    DEFAULT_MAX_RESPONSE_TIME, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_STATUSES, DEFAULT_TIMEOUT,
};
