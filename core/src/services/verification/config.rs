//! Configuration for the verification dispatch services

use std::time::Duration;

use chrono::Duration as TtlDuration;
use courier_shared::config::dispatch::{MAX_CODE_TTL_SECONDS, MAX_DEBOUNCE_WINDOW_SECONDS};
use courier_shared::DispatchConfig;

use crate::domain::entities::verification_record::{DEFAULT_MAX_ATTEMPTS, DEFAULT_TTL_SECONDS};
use crate::errors::{DomainError, DomainResult};

use super::retry::RetryPolicy;

/// Runtime settings of the delivery coordinator
#[derive(Debug, Clone)]
pub struct VerificationServiceConfig {
    /// Number of symbols in a generated code
    pub code_length: usize,
    /// Symbols a code is drawn from
    pub code_alphabet: String,
    /// Lifetime of an issued code in seconds
    pub code_ttl_seconds: i64,
    /// Window in which a repeat dispatch for the same key is debounced
    pub debounce_window_seconds: i64,
    /// Checks allowed per record
    pub max_verify_attempts: u32,
    /// Timeout of a single transport send
    pub send_timeout: Duration,
    /// Upper bound for the whole delivery sequence
    pub dispatch_timeout: Duration,
    /// Retry and backoff policy for transient failures
    pub retry: RetryPolicy,
    /// Number of lock shards for per-key serialization
    pub lock_shards: usize,
}

impl Default for VerificationServiceConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            code_alphabet: String::from("0123456789"),
            code_ttl_seconds: DEFAULT_TTL_SECONDS,
            debounce_window_seconds: 30,
            max_verify_attempts: DEFAULT_MAX_ATTEMPTS,
            send_timeout: Duration::from_secs(10),
            dispatch_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            lock_shards: 64,
        }
    }
}

impl VerificationServiceConfig {
    /// Check the durations the coordinator turns into timestamps
    ///
    /// # Returns
    ///
    /// * `Err(DomainError::Configuration)` - TTL outside `1..=MAX_CODE_TTL_SECONDS`
    ///   or a debounce window outside `0..=MAX_DEBOUNCE_WINDOW_SECONDS`
    pub fn validate(&self) -> DomainResult<()> {
        check_range(
            "code TTL",
            self.code_ttl_seconds,
            1,
            MAX_CODE_TTL_SECONDS,
        )?;
        check_range(
            "debounce window",
            self.debounce_window_seconds,
            0,
            MAX_DEBOUNCE_WINDOW_SECONDS,
        )
    }

    /// Lifetime of an issued code; call after [`validate`](Self::validate)
    pub fn code_ttl(&self) -> TtlDuration {
        TtlDuration::seconds(self.code_ttl_seconds)
    }

    pub fn debounce_window(&self) -> TtlDuration {
        TtlDuration::seconds(self.debounce_window_seconds)
    }
}

fn check_range(name: &str, value: i64, min: i64, max: u64) -> DomainResult<()> {
    let max = i64::try_from(max).unwrap_or(i64::MAX);
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DomainError::Configuration {
            message: format!("{} must be between {} and {} seconds, got {}", name, min, max, value),
        })
    }
}

fn seconds_from(name: &str, value: u64) -> DomainResult<i64> {
    i64::try_from(value).map_err(|_| DomainError::Configuration {
        message: format!("{} of {} seconds is out of range", name, value),
    })
}

impl TryFrom<&DispatchConfig> for VerificationServiceConfig {
    type Error = DomainError;

    fn try_from(config: &DispatchConfig) -> DomainResult<Self> {
        let service_config = Self {
            code_length: config.code_length,
            code_alphabet: config.code_alphabet.clone(),
            code_ttl_seconds: seconds_from("code TTL", config.code_ttl_seconds)?,
            debounce_window_seconds: seconds_from(
                "debounce window",
                config.debounce_window_seconds,
            )?,
            max_verify_attempts: config.max_verify_attempts,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
            retry: RetryPolicy::from(config),
            ..Self::default()
        };
        service_config.validate()?;
        Ok(service_config)
    }
}
