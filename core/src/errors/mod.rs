//! Domain error taxonomy.
//!
//! Provider and storage specific errors are normalised into [`DomainError`]
//! before they leave a collaborator; callers never see transport SDK types.

use courier_shared::error_codes;
use thiserror::Error;

/// Errors returned by the dispatch pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad template registration, missing credentials, invalid settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("No template registered for purpose: {purpose}")]
    UnknownTemplate { purpose: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Retried per policy; only surfaced once retries are exhausted
    #[error("Transient delivery failure: {message}")]
    TransientDelivery { message: String },

    /// Bad address or rejected content; never retried
    #[error("Permanent delivery failure: {message}")]
    PermanentDelivery { message: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Secure random source unavailable: {message}")]
    EntropyUnavailable { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    /// Stable error code reported to API clients
    pub fn error_code(&self) -> &'static str {
        match self {
            DomainError::Configuration { .. } => error_codes::CONFIGURATION_ERROR,
            DomainError::UnknownTemplate { .. } => error_codes::UNKNOWN_TEMPLATE,
            DomainError::Validation { .. } => error_codes::VALIDATION_ERROR,
            DomainError::TransientDelivery { .. } | DomainError::PermanentDelivery { .. } => {
                error_codes::DELIVERY_FAILED
            }
            DomainError::RateLimited { .. } => error_codes::RATE_LIMITED,
            DomainError::Storage { .. } => error_codes::STORAGE_ERROR,
            DomainError::EntropyUnavailable { .. } | DomainError::Internal { .. } => {
                error_codes::INTERNAL_ERROR
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DomainError::Configuration { .. } | DomainError::EntropyUnavailable { .. }
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
