//! In-process sliding-window rate limiter

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use courier_core::{DomainResult, RateLimitDecision, RateLimiter};

/// Sliding-window limiter for a single process
///
/// Keeps the dispatch instants of each recipient inside the window.
pub struct InMemoryRateLimiter {
    limit: u32,
    window: Duration,
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            history: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check_and_record(&self, recipient: &str) -> DomainResult<RateLimitDecision> {
        let now = Instant::now();
        let mut history = self.history.lock().await;
        // Drop recipients whose whole history left the window
        history.retain(|_, sent| {
            while sent
                .front()
                .is_some_and(|at| now.duration_since(*at) >= self.window)
            {
                sent.pop_front();
            }
            !sent.is_empty()
        });
        let sent = history.entry(recipient.to_string()).or_default();

        if sent.len() >= self.limit as usize {
            let retry_after = sent
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            // Round up so the caller never retries early
            let retry_after_seconds = retry_after.as_millis().div_ceil(1000).max(1) as u64;
            return Ok(RateLimitDecision::Limited {
                retry_after_seconds,
            });
        }

        sent.push_back(now);
        Ok(RateLimitDecision::Allowed {
            remaining: self.limit - sent.len() as u32,
        })
    }

    async fn release(&self, recipient: &str) -> DomainResult<()> {
        let mut history = self.history.lock().await;
        if let Some(sent) = history.get_mut(recipient) {
            sent.pop_back();
            if sent.is_empty() {
                history.remove(recipient);
            }
        }
        Ok(())
    }

    async fn reset(&self, recipient: &str) -> DomainResult<()> {
        self.history.lock().await.remove(recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: &str = "jane@example.com";

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = InMemoryRateLimiter::new(3, Duration::from_secs(3600));

        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.check_and_record(RECIPIENT).await.unwrap(),
                RateLimitDecision::Allowed {
                    remaining: expected
                }
            );
        }

        match limiter.check_and_record(RECIPIENT).await.unwrap() {
            RateLimitDecision::Limited {
                retry_after_seconds,
            } => assert!(retry_after_seconds > 3590 && retry_after_seconds <= 3600),
            other => panic!("expected Limited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recipients_are_independent() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(3600));

        assert!(matches!(
            limiter.check_and_record("a@example.com").await.unwrap(),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_and_record("b@example.com").await.unwrap(),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = InMemoryRateLimiter::new(2, Duration::from_secs(60));

        limiter.check_and_record(RECIPIENT).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check_and_record(RECIPIENT).await.unwrap();

        assert_eq!(
            limiter.check_and_record(RECIPIENT).await.unwrap(),
            RateLimitDecision::Limited {
                retry_after_seconds: 30
            }
        );

        // The first dispatch leaves the window
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(
            limiter.check_and_record(RECIPIENT).await.unwrap(),
            RateLimitDecision::Allowed { remaining: 0 }
        );
    }

    #[tokio::test]
    async fn test_limited_requests_are_not_counted() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        limiter.check_and_record(RECIPIENT).await.unwrap();

        for _ in 0..5 {
            limiter.check_and_record(RECIPIENT).await.unwrap();
        }
        assert_eq!(limiter.history.lock().await[RECIPIENT].len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_recipients_are_forgotten() {
        let limiter = InMemoryRateLimiter::new(2, Duration::from_secs(60));
        limiter.check_and_record("a@example.com").await.unwrap();
        limiter.check_and_record("b@example.com").await.unwrap();
        assert_eq!(limiter.history.lock().await.len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.check_and_record("c@example.com").await.unwrap();

        let history = limiter.history.lock().await;
        assert_eq!(history.len(), 1);
        assert!(history.contains_key("c@example.com"));
    }

    #[tokio::test]
    async fn test_release_returns_slot() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        limiter.check_and_record(RECIPIENT).await.unwrap();
        limiter.release(RECIPIENT).await.unwrap();

        assert!(limiter.history.lock().await.is_empty());
        assert_eq!(
            limiter.check_and_record(RECIPIENT).await.unwrap(),
            RateLimitDecision::Allowed { remaining: 0 }
        );
    }

    #[tokio::test]
    async fn test_reset() {
        let limiter = InMemoryRateLimiter::new(1, Duration::from_secs(60));
        limiter.check_and_record(RECIPIENT).await.unwrap();
        limiter.reset(RECIPIENT).await.unwrap();

        assert!(matches!(
            limiter.check_and_record(RECIPIENT).await.unwrap(),
            RateLimitDecision::Allowed { .. }
        ));
    }
}
