//! Per-recipient dispatch rate limiters
//!
//! Both implementations use a sliding window: a dispatch is allowed when fewer
//! than the configured number of dispatches were recorded for the recipient
//! during the last window. Recipients are counted across all purposes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::info;

use courier_core::{DomainResult, RateLimitDecision, RateLimiter};
use courier_shared::RateLimitConfig;

use crate::InfrastructureError;

pub mod memory;
pub mod redis_limiter;

pub use memory::InMemoryRateLimiter;
pub use redis_limiter::RedisRateLimiter;

/// Create the limiter selected by the configuration
///
/// * disabled - every dispatch is allowed
/// * `REDIS_URL` set - shared sliding window in Redis
/// * otherwise - in-process sliding window
pub async fn create_rate_limiter(
    config: &RateLimitConfig,
) -> Result<Arc<dyn RateLimiter>, InfrastructureError> {
    config
        .validate()
        .map_err(|e| InfrastructureError::Config(e.to_string()))?;

    if !config.enabled {
        info!("Dispatch rate limiting disabled");
        return Ok(Arc::new(DisabledRateLimiter));
    }

    let window = Duration::from_secs(config.window_seconds);
    match &config.redis_url {
        Some(url) => {
            let limiter =
                RedisRateLimiter::connect(url, config.per_recipient_per_window, window).await?;
            info!(
                limit = config.per_recipient_per_window,
                window_secs = config.window_seconds,
                "Using Redis dispatch rate limiter"
            );
            Ok(Arc::new(limiter))
        }
        None => {
            info!(
                limit = config.per_recipient_per_window,
                window_secs = config.window_seconds,
                "Using in-memory dispatch rate limiter"
            );
            Ok(Arc::new(InMemoryRateLimiter::new(
                config.per_recipient_per_window,
                window,
            )))
        }
    }
}

/// Limiter used when rate limiting is switched off
pub struct DisabledRateLimiter;

#[async_trait]
impl RateLimiter for DisabledRateLimiter {
    async fn check_and_record(&self, _recipient: &str) -> DomainResult<RateLimitDecision> {
        Ok(RateLimitDecision::Allowed {
            remaining: u32::MAX,
        })
    }

    async fn release(&self, _recipient: &str) -> DomainResult<()> {
        Ok(())
    }

    async fn reset(&self, _recipient: &str) -> DomainResult<()> {
        Ok(())
    }
}

/// Hex SHA-256 of the recipient, so addresses never appear in keys
pub(crate) fn hash_recipient(recipient: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(recipient.as_bytes());
    hex::encode(hasher.finalize())
}
