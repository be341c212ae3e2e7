//! Dispatch request, delivery attempt and outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_shared::utils::email::{is_valid_email, normalize_email};

use super::purpose::Purpose;
use crate::errors::{DomainError, DomainResult};

/// A single dispatch call, alive only for the duration of the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Normalised recipient address
    pub recipient: String,
    pub purpose: Purpose,
    pub requested_at: DateTime<Utc>,
}

impl VerificationRequest {
    /// Normalise and validate the recipient address
    pub fn new(recipient: &str, purpose: Purpose) -> DomainResult<Self> {
        let recipient = normalize_email(recipient);
        if !is_valid_email(&recipient) {
            return Err(DomainError::Validation {
                message: "Invalid recipient address".to_string(),
            });
        }

        Ok(Self {
            recipient,
            purpose,
            requested_at: Utc::now(),
        })
    }
}

/// Classified result of one transport send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportResult {
    Sent,
    TransientFailure,
    PermanentFailure,
}

/// One send attempt, kept for retry decisions and reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub request_id: Uuid,
    pub transport_result: TransportResult,
    /// 1-based
    pub attempt_number: u32,
    pub timestamp: DateTime<Utc>,
    /// Provider message id on success, normalised error detail on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Terminal state of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Delivered,
    Failed,
    /// A code was sent moments ago; nothing new was generated or sent
    Debounced,
}

/// Result of a dispatch call
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    pub status: DispatchStatus,
    /// Id of the verification record the outcome refers to
    pub request_id: Uuid,
    pub attempts: Vec<DeliveryAttempt>,
    pub expires_at: DateTime<Utc>,
    /// Why delivery failed, for `Failed` outcomes
    pub error: Option<DomainError>,
}

impl DispatchOutcome {
    pub fn delivered(request_id: Uuid, expires_at: DateTime<Utc>, attempts: Vec<DeliveryAttempt>) -> Self {
        Self {
            status: DispatchStatus::Delivered,
            request_id,
            attempts,
            expires_at,
            error: None,
        }
    }

    pub fn failed(
        request_id: Uuid,
        expires_at: DateTime<Utc>,
        attempts: Vec<DeliveryAttempt>,
        error: DomainError,
    ) -> Self {
        Self {
            status: DispatchStatus::Failed,
            request_id,
            attempts,
            expires_at,
            error: Some(error),
        }
    }

    pub fn debounced(request_id: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: DispatchStatus::Debounced,
            request_id,
            attempts: Vec::new(),
            expires_at,
            error: None,
        }
    }

    pub fn send_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Result of checking a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Valid,
    Invalid,
    Expired,
    AlreadyConsumed,
}

impl CheckOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, CheckOutcome::Valid)
    }
}
