//! Dispatch pipeline configuration module
//!
//! Recognised environment options: `CODE_LENGTH`, `CODE_ALPHABET`,
//! `CODE_TTL_SECONDS`, `MAX_SEND_RETRIES`, `DEBOUNCE_WINDOW_SECONDS`,
//! `MAX_VERIFY_ATTEMPTS`, `SEND_TIMEOUT_MS`, `DISPATCH_TIMEOUT_MS`,
//! `RETRY_BASE_DELAY_MS`, `RETRY_MAX_DELAY_MS`, `STORE_CLEANUP_INTERVAL_SECONDS`.

use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse, ConfigError};

/// Longest accepted code lifetime (one day)
pub const MAX_CODE_TTL_SECONDS: u64 = 86_400;

/// Longest accepted debounce window (one day)
pub const MAX_DEBOUNCE_WINDOW_SECONDS: u64 = 86_400;

/// Most send attempts a single dispatch may make
pub const MAX_SEND_ATTEMPTS: u32 = 20;

/// Longest accepted backoff delay (one hour)
pub const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

/// Settings for code generation, expiry, delivery retries and debouncing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Number of symbols in a generated code
    pub code_length: usize,

    /// Symbols a code is drawn from
    pub code_alphabet: String,

    /// Lifetime of an issued code in seconds
    pub code_ttl_seconds: u64,

    /// Total send attempts per dispatch (first attempt included)
    pub max_send_retries: u32,

    /// Window in which a repeated dispatch for the same recipient and purpose is suppressed
    pub debounce_window_seconds: u64,

    /// Failed checks allowed before a code is exhausted
    pub max_verify_attempts: u32,

    /// Timeout for a single transport send in milliseconds
    pub send_timeout_ms: u64,

    /// Upper bound for the whole delivery sequence in milliseconds
    pub dispatch_timeout_ms: u64,

    /// First backoff delay in milliseconds
    pub retry_base_delay_ms: u64,

    /// Largest backoff delay in milliseconds
    pub retry_max_delay_ms: u64,

    /// Backoff multiplier between attempts
    #[serde(default = "default_retry_factor")]
    pub retry_factor: f64,

    /// Jitter ratio applied to each delay (0.2 = +/-20%)
    #[serde(default = "default_retry_jitter")]
    pub retry_jitter: f64,

    /// How often expired records are purged from the store
    pub cleanup_interval_seconds: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_alphabet: String::from("0123456789"),
            code_ttl_seconds: 600,
            max_send_retries: 3,
            debounce_window_seconds: 30,
            max_verify_attempts: 5,
            send_timeout_ms: 10_000,
            dispatch_timeout_ms: 60_000,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            retry_factor: default_retry_factor(),
            retry_jitter: default_retry_jitter(),
            cleanup_interval_seconds: 300,
        }
    }
}

impl DispatchConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            code_length: env_parse("CODE_LENGTH", defaults.code_length),
            code_alphabet: env_opt("CODE_ALPHABET").unwrap_or(defaults.code_alphabet),
            code_ttl_seconds: env_parse("CODE_TTL_SECONDS", defaults.code_ttl_seconds),
            max_send_retries: env_parse("MAX_SEND_RETRIES", defaults.max_send_retries),
            debounce_window_seconds: env_parse(
                "DEBOUNCE_WINDOW_SECONDS",
                defaults.debounce_window_seconds,
            ),
            max_verify_attempts: env_parse("MAX_VERIFY_ATTEMPTS", defaults.max_verify_attempts),
            send_timeout_ms: env_parse("SEND_TIMEOUT_MS", defaults.send_timeout_ms),
            dispatch_timeout_ms: env_parse("DISPATCH_TIMEOUT_MS", defaults.dispatch_timeout_ms),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", defaults.retry_max_delay_ms),
            retry_factor: defaults.retry_factor,
            retry_jitter: defaults.retry_jitter,
            cleanup_interval_seconds: env_parse(
                "STORE_CLEANUP_INTERVAL_SECONDS",
                defaults.cleanup_interval_seconds,
            ),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.code_length == 0 {
            return Err(ConfigError::invalid("CODE_LENGTH", "must be greater than zero"));
        }
        if self.code_alphabet.chars().count() < 2 {
            return Err(ConfigError::invalid(
                "CODE_ALPHABET",
                "must contain at least two symbols",
            ));
        }
        if self.code_ttl_seconds == 0 || self.code_ttl_seconds > MAX_CODE_TTL_SECONDS {
            return Err(ConfigError::invalid(
                "CODE_TTL_SECONDS",
                format!("must be between 1 and {}", MAX_CODE_TTL_SECONDS),
            ));
        }
        if self.debounce_window_seconds > MAX_DEBOUNCE_WINDOW_SECONDS {
            return Err(ConfigError::invalid(
                "DEBOUNCE_WINDOW_SECONDS",
                format!("must not exceed {}", MAX_DEBOUNCE_WINDOW_SECONDS),
            ));
        }
        if self.max_send_retries == 0 || self.max_send_retries > MAX_SEND_ATTEMPTS {
            return Err(ConfigError::invalid(
                "MAX_SEND_RETRIES",
                format!("must be between 1 and {}", MAX_SEND_ATTEMPTS),
            ));
        }
        if self.max_verify_attempts == 0 {
            return Err(ConfigError::invalid("MAX_VERIFY_ATTEMPTS", "must be at least 1"));
        }
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::invalid("SEND_TIMEOUT_MS", "must be greater than zero"));
        }
        if self.dispatch_timeout_ms < self.send_timeout_ms {
            return Err(ConfigError::invalid(
                "DISPATCH_TIMEOUT_MS",
                "must not be shorter than SEND_TIMEOUT_MS",
            ));
        }
        if self.retry_max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::invalid(
                "RETRY_MAX_DELAY_MS",
                format!("must not exceed {}", MAX_RETRY_DELAY_MS),
            ));
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(ConfigError::invalid(
                "RETRY_MAX_DELAY_MS",
                "must not be shorter than RETRY_BASE_DELAY_MS",
            ));
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(ConfigError::invalid("retry_jitter", "must be within [0, 1)"));
        }
        if self.retry_factor < 1.0 {
            return Err(ConfigError::invalid("retry_factor", "must be at least 1.0"));
        }
        Ok(())
    }
}

fn default_retry_factor() -> f64 {
    2.0
}

fn default_retry_jitter() -> f64 {
    0.2
}
