//! Configuration module with business-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `dispatch` - Code generation, expiry, retry and debounce settings
//! - `email` - E-mail transport provider selection and credentials
//! - `environment` - Environment detection and logging configuration
//! - `rate_limit` - Per-recipient dispatch quotas
//! - `server` - HTTP server configuration

pub mod dispatch;
pub mod email;
pub mod environment;
pub mod rate_limit;
pub mod server;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

// Re-export commonly used types
pub use dispatch::DispatchConfig;
pub use email::{EmailConfig, EmailProviderKind, HttpApiSettings, SmtpSettings};
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use rate_limit::RateLimitConfig;
pub use server::ServerConfig;

/// Configuration errors detected at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {key}")]
    Missing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or unparsable.
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read an environment variable, treating blank values as unset.
pub(crate) fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Environment configuration
    pub environment: Environment,

    /// Server configuration
    pub server: ServerConfig,

    /// Dispatch pipeline configuration
    pub dispatch: DispatchConfig,

    /// E-mail transport configuration
    pub email: EmailConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            server: ServerConfig::default(),
            dispatch: DispatchConfig::default(),
            email: EmailConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        let mut logging = LoggingConfig::for_environment(environment);
        if let Some(level) = env_opt("LOG_LEVEL") {
            logging.level = level;
        }

        Self {
            environment,
            server: ServerConfig::from_env(),
            dispatch: DispatchConfig::from_env(),
            email: EmailConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            logging,
        }
    }

    /// Validate every section; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch.validate()?;
        self.email.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }
}
