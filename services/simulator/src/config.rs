//! Application Configuration Module
//!
//! Loads the simulator's settings from environment variables into a single
//! struct that `main` hands to the backend and logger.

use secrecy::SecretString;
use std::env;
use tracing::Level;

/// Base URL used when `SLE_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Offline,
}

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub api_url: String,
    pub api_token: Option<SecretString>,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `SLE_BACKEND`: "http" or "offline". Defaults to "http".
    // *   `SLE_API_URL`: (Optional) Base URL of the tRPC server. Defaults to `DEFAULT_API_URL`.
    // *   `SLE_API_TOKEN`: Bearer token for the tRPC server. Required for the http backend.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_str = lookup("SLE_BACKEND").unwrap_or_else(|| "http".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "http" => BackendKind::Http,
            "offline" => BackendKind::Offline,
            _ => {
                return Err(ConfigError::InvalidValue {
                    name: "SLE_BACKEND".to_string(),
                    value: backend_str,
                });
            }
        };

        let api_url = lookup("SLE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_token = lookup("SLE_API_TOKEN")
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue {
                name: "RUST_LOG".to_string(),
                value: log_level_str,
            })?;

        Ok(Self {
            backend,
            api_url,
            api_token,
            log_level,
        })
    }

    /// Switches to the offline backend, which needs no token.
    pub fn offline(mut self) -> Self {
        self.backend = BackendKind::Offline;
        self
    }

    /// Checks that the selected backend has what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Http && self.api_token.is_none() {
            return Err(ConfigError::MissingVar(
                "SLE_API_TOKEN must be set for the http backend".to_string(),
            ));
        }
        Ok(())
    }
}
