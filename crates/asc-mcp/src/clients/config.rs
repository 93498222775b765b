//! Service configuration for the App Store Connect client.
//!
//! Provides the credential location, API endpoint, timeout and retry
//! settings. Configuration is loaded from environment variables; only the
//! three credential values are mandatory.

use asc_auth::Credentials;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.appstoreconnect.apple.com";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },

    /// The private key path does not point at a file.
    #[error("Private key file not found: {0}")]
    KeyFileNotFound(String),
}

/// Configuration for the App Store Connect service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Issuer id of the API key.
    pub issuer_id: String,

    /// Key id of the API key.
    pub key_id: String,

    /// Path to the `.p8` private key.
    pub private_key_path: PathBuf,

    /// API endpoint.
    pub endpoint: ServiceEndpoint,

    /// Request timeout in seconds.
    pub default_timeout_secs: u64,

    /// Attempts for idempotent reads (1 disables retries).
    pub max_retries: u32,
}

impl ServiceConfig {
    /// Environment variable holding the issuer id.
    pub const ISSUER_ID_VAR: &'static str = "APP_STORE_CONNECT_ISSUER_ID";
    /// Environment variable holding the key id.
    pub const KEY_ID_VAR: &'static str = "APP_STORE_CONNECT_KEY_ID";
    /// Environment variable holding the private key path.
    pub const KEY_PATH_VAR: &'static str = "APP_STORE_CONNECT_P8_PATH";
    /// Environment variable overriding the API base URL.
    pub const BASE_URL_VAR: &'static str = "APP_STORE_CONNECT_BASE_URL";
    /// Environment variable holding the request timeout.
    pub const TIMEOUT_VAR: &'static str = "APP_STORE_CONNECT_TIMEOUT_SECS";
    /// Environment variable holding the read retry attempts.
    pub const MAX_RETRIES_VAR: &'static str = "APP_STORE_CONNECT_MAX_RETRIES";

    /// Create a configuration with default endpoint, timeout and retries.
    pub fn new(
        issuer_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            key_id: key_id.into(),
            private_key_path: private_key_path.into(),
            endpoint: ServiceEndpoint::default(),
            default_timeout_secs: 30,
            max_retries: 3,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `APP_STORE_CONNECT_ISSUER_ID`: issuer id (required)
    /// - `APP_STORE_CONNECT_KEY_ID`: key id (required)
    /// - `APP_STORE_CONNECT_P8_PATH`: private key path (required, must exist)
    /// - `APP_STORE_CONNECT_BASE_URL`: API URL (default: https://api.appstoreconnect.apple.com)
    /// - `APP_STORE_CONNECT_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `APP_STORE_CONNECT_MAX_RETRIES`: Attempts for reads (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let mut config = Self::new(
            required(Self::ISSUER_ID_VAR)?,
            required(Self::KEY_ID_VAR)?,
            required(Self::KEY_PATH_VAR)?,
        );

        if let Some(base_url) = lookup(Self::BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            config.endpoint.base_url = base_url.trim().to_string();
        }
        if let Some(raw) = lookup(Self::TIMEOUT_VAR) {
            config.default_timeout_secs = parse_number(Self::TIMEOUT_VAR, &raw)?;
        }
        if let Some(raw) = lookup(Self::MAX_RETRIES_VAR) {
            config.max_retries = parse_number(Self::MAX_RETRIES_VAR, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.private_key_path.is_file() {
            return Err(ConfigError::KeyFileNotFound(
                self.private_key_path.display().to_string(),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: Self::TIMEOUT_VAR.to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: Self::MAX_RETRIES_VAR.to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.endpoint.base_url.starts_with("https://")
            && !self.endpoint.base_url.starts_with("http://")
        {
            return Err(ConfigError::InvalidValue {
                key: Self::BASE_URL_VAR.to_string(),
                message: format!("not an http(s) URL: {}", self.endpoint.base_url),
            });
        }
        Ok(())
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Credentials for the token signer.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.issuer_id, &self.key_id, &self.private_key_path)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Configuration for the API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL for the service (e.g., "https://api.appstoreconnect.apple.com").
    pub base_url: String,
}

impl Default for ServiceEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ServiceEndpoint {
    /// Create an endpoint for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}
