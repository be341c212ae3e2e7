//! Traits for the collaborators of the dispatch pipeline

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::entities::{CheckOutcome, Message, Purpose, VerificationRecord};
use crate::errors::{DomainError, DomainResult};

/// Provider acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReceipt {
    /// Name of the transport that accepted the message
    pub provider: String,
    /// Provider-assigned message id, when one is returned
    pub message_id: Option<String>,
}

impl TransportReceipt {
    pub fn new(provider: impl Into<String>, message_id: Option<String>) -> Self {
        Self {
            provider: provider.into(),
            message_id,
        }
    }
}

/// Normalised transport failure
///
/// Implementations map provider responses onto these two classes; nothing
/// provider-specific crosses this boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure, timeout, provider throttling or 5xx; worth retrying
    #[error("transient: {0}")]
    Transient(String),

    /// Bad address or rejected content; retrying will not help
    #[error("permanent: {0}")]
    Permanent(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            TransportError::Transient(detail) | TransportError::Permanent(detail) => detail,
        }
    }
}

impl From<TransportError> for DomainError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Transient(message) => DomainError::TransientDelivery { message },
            TransportError::Permanent(message) => DomainError::PermanentDelivery { message },
        }
    }
}

/// Delivers rendered messages to recipients
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt delivery of one message
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError>;

    /// Short provider name for logs and receipts
    fn provider_name(&self) -> &str;
}

/// Holds outstanding verification records
///
/// Implementations must be safe for concurrent use across all keys. A key is
/// the (recipient, purpose) pair; recipients are already normalised.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Persist a record, replacing whatever the key held before
    async fn put(&self, record: VerificationRecord) -> DomainResult<()>;

    /// Supersede the unconsumed record of a key; returns whether one existed
    async fn invalidate(&self, recipient: &str, purpose: Purpose) -> DomainResult<bool>;

    /// The unconsumed, unexpired, non-exhausted record of a key
    async fn get_active(
        &self,
        recipient: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<VerificationRecord>>;

    /// Check a submitted code against the record of a key
    async fn consume(
        &self,
        recipient: &str,
        purpose: Purpose,
        submitted_code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<CheckOutcome>;

    /// Drop records past their post-expiry retention; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> DomainResult<usize>;
}

/// Decision of a rate limiter for one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_seconds: u64 },
}

/// Per-recipient dispatch quota
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a dispatch for the recipient if the quota allows it
    async fn check_and_record(&self, recipient: &str) -> DomainResult<RateLimitDecision>;

    /// Give back the most recently recorded dispatch of the recipient
    ///
    /// Called when a dispatch fails after its slot was recorded but before
    /// anything was sent.
    async fn release(&self, recipient: &str) -> DomainResult<()>;

    /// Forget the recipient's history
    async fn reset(&self, recipient: &str) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_into_domain() {
        let err: DomainError = TransportError::Transient("timeout".to_string()).into();
        assert_eq!(
            err,
            DomainError::TransientDelivery {
                message: "timeout".to_string()
            }
        );

        let err: DomainError = TransportError::Permanent("550 no such user".to_string()).into();
        assert!(matches!(err, DomainError::PermanentDelivery { .. }));
    }
}
