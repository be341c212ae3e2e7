//! Redis sliding-window rate limiter
//!
//! Each recipient owns a sorted set of dispatch timestamps (milliseconds) under
//! `rate_limit:dispatch:{sha256(recipient)}`. Pruning, recording and counting
//! run in one MULTI/EXEC so concurrent instances share an exact count.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

use courier_core::{DomainError, DomainResult, RateLimitDecision, RateLimiter};

use super::hash_recipient;
use crate::InfrastructureError;

const KEY_PREFIX: &str = "rate_limit:dispatch";

/// Rate limiter shared by every instance connected to the same Redis
pub struct RedisRateLimiter {
    connection: MultiplexedConnection,
    limit: u32,
    window: Duration,
}

impl RedisRateLimiter {
    /// Connect to Redis and verify the connection with a PING
    pub async fn connect(url: &str, limit: u32, window: Duration) -> Result<Self, InfrastructureError> {
        let client = redis::Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut connection)
            .await?;

        Ok(Self {
            connection,
            limit,
            window,
        })
    }

    fn key(recipient: &str) -> String {
        format!("{}:{}", KEY_PREFIX, hash_recipient(recipient))
    }

    fn window_millis(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

fn storage_error(context: &str, e: redis::RedisError) -> DomainError {
    DomainError::Storage {
        message: format!("{}: {}", context, e),
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_and_record(&self, recipient: &str) -> DomainResult<RateLimitDecision> {
        let key = Self::key(recipient);
        let mut conn = self.connection.clone();

        let now = Utc::now().timestamp_millis();
        let window_start = now - self.window_millis();
        // Unique member so two dispatches in the same millisecond both count
        let member = format!("{}:{}", now, Uuid::new_v4().simple());

        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg("-inf")
            .arg(window_start)
            .ignore()
            .cmd("ZADD")
            .arg(&key)
            .arg(now)
            .arg(&member)
            .ignore()
            .cmd("ZCARD")
            .arg(&key)
            .cmd("PEXPIRE")
            .arg(&key)
            .arg(self.window_millis())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| storage_error("Failed to update rate limit window", e))?;

        if count <= self.limit {
            return Ok(RateLimitDecision::Allowed {
                remaining: self.limit - count,
            });
        }

        // Over the limit: the rejected dispatch must not occupy the window
        conn.zrem::<_, _, ()>(&key, &member)
            .await
            .map_err(|e| storage_error("Failed to roll back rate limit entry", e))?;

        let oldest: Vec<(String, i64)> = conn
            .zrange_withscores(&key, 0, 0)
            .await
            .map_err(|e| storage_error("Failed to read rate limit window", e))?;

        let retry_after_millis = oldest
            .first()
            .map(|(_, at)| at + self.window_millis() - now)
            .unwrap_or_else(|| self.window_millis());
        let retry_after_seconds = ((retry_after_millis + 999) / 1000).max(1) as u64;

        debug!(
            count = count - 1,
            limit = self.limit,
            retry_after_seconds = retry_after_seconds,
            "Recipient dispatch quota exhausted"
        );

        Ok(RateLimitDecision::Limited {
            retry_after_seconds,
        })
    }

    async fn release(&self, recipient: &str) -> DomainResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("ZPOPMAX")
            .arg(Self::key(recipient))
            .arg(1)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| storage_error("Failed to release rate limit entry", e))
    }

    async fn reset(&self, recipient: &str) -> DomainResult<()> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(Self::key(recipient))
            .await
            .map_err(|e| storage_error("Failed to reset rate limit", e))
    }
}
