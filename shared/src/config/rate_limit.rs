//! Rate limiting configuration module

use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse, ConfigError};

/// Per-recipient dispatch quota, applied on top of the debounce window
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Max dispatches per recipient inside one window, across all purposes
    pub per_recipient_per_window: u32,

    /// Sliding window length in seconds
    pub window_seconds: u64,

    /// Redis URL; when absent an in-process limiter is used
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            per_recipient_per_window: 5,
            window_seconds: 3600,
            redis_url: None,
        }
    }
}

impl RateLimitConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_parse("RATE_LIMIT_ENABLED", defaults.enabled),
            per_recipient_per_window: env_parse(
                "RATE_LIMIT_PER_RECIPIENT_PER_HOUR",
                defaults.per_recipient_per_window,
            ),
            window_seconds: env_parse("RATE_LIMIT_WINDOW_SECONDS", defaults.window_seconds),
            redis_url: env_opt("REDIS_URL"),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.per_recipient_per_window == 0 {
            return Err(ConfigError::invalid(
                "RATE_LIMIT_PER_RECIPIENT_PER_HOUR",
                "must be at least 1 when rate limiting is enabled",
            ));
        }
        if self.window_seconds == 0 {
            return Err(ConfigError::invalid(
                "RATE_LIMIT_WINDOW_SECONDS",
                "must be greater than zero",
            ));
        }
        if let Some(url) = &self.redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::invalid("REDIS_URL", "must use redis:// or rediss://"));
            }
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_limits_skip_validation() {
        let config = RateLimitConfig {
            enabled: false,
            per_recipient_per_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_url_scheme() {
        let config = RateLimitConfig {
            redis_url: Some("http://localhost:6379".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RateLimitConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
