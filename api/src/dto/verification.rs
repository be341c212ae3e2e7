use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use courier_core::{CheckOutcome, DispatchOutcome, DispatchStatus};
use courier_shared::utils::email::{is_valid_email, normalize_email};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchRequest {
    /// Recipient e-mail address; surrounding whitespace and case are ignored
    #[validate(custom = "validate_recipient")]
    pub recipient: String,

    /// One of `signup_verify`, `password_reset`, `email_change`
    #[validate(length(min = 1, max = 32))]
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckRequest {
    #[validate(custom = "validate_recipient")]
    pub recipient: String,

    #[validate(length(min = 1, max = 32))]
    pub purpose: String,

    /// Code as received by the user
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub status: DispatchStatus,
    pub request_id: Uuid,
    pub expires_at: DateTime<Utc>,
    /// Send attempts made by this call; zero when debounced
    pub attempts: usize,
    pub message: String,
}

impl From<&DispatchOutcome> for DispatchResponse {
    fn from(outcome: &DispatchOutcome) -> Self {
        let message = match outcome.status {
            DispatchStatus::Delivered => "Verification code sent",
            DispatchStatus::Debounced => "A verification code was sent recently, check your inbox",
            DispatchStatus::Failed => "Verification code could not be delivered",
        };

        Self {
            status: outcome.status,
            request_id: outcome.request_id,
            expires_at: outcome.expires_at,
            attempts: outcome.send_count(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub outcome: CheckOutcome,
    pub valid: bool,
}

impl From<CheckOutcome> for CheckResponse {
    fn from(outcome: CheckOutcome) -> Self {
        Self {
            outcome,
            valid: outcome.is_valid(),
        }
    }
}

fn validate_recipient(recipient: &str) -> Result<(), ValidationError> {
    if is_valid_email(&normalize_email(recipient)) {
        Ok(())
    } else {
        let mut error = ValidationError::new("recipient");
        error.message = Some("must be a valid e-mail address".into());
        Err(error)
    }
}
