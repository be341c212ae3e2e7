//! # Infrastructure Layer
//!
//! Concrete collaborators for the Courier dispatch pipeline:
//! - **Email**: transports (mock, SMTP via lettre, HTTP API via reqwest, failover)
//! - **Store**: in-memory verification record store
//! - **Rate limiting**: in-memory and Redis sliding-window limiters
//!
//! [`initialize`] wires them together from an [`AppConfig`].

use std::sync::Arc;

use courier_core::{RateLimiter, Transport};
use courier_shared::AppConfig;

// Re-export core types for convenience
pub use courier_core::errors::*;

/// E-mail transports
pub mod email;

/// Per-recipient rate limiters
pub mod rate_limit;

/// Verification record stores
pub mod store;

use store::InMemoryVerificationStore;

/// Infrastructure service container handed to the application layer
#[derive(Clone)]
pub struct InfrastructureServices {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<InMemoryVerificationStore>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

/// Initialize infrastructure services
///
/// This function sets up:
/// - The e-mail transport selected by `EMAIL_PROVIDER`
/// - The verification record store
/// - The rate limiter (Redis when `REDIS_URL` is set)
///
/// Missing credentials or an unreachable Redis are reported as errors so the
/// process can refuse to start.
pub async fn initialize(config: &AppConfig) -> Result<InfrastructureServices, InfrastructureError> {
    tracing::info!(
        provider = %config.email.provider,
        environment = %config.environment,
        "Initializing infrastructure services..."
    );

    let transport = email::create_transport(&config.email)?;
    let rate_limiter = rate_limit::create_rate_limiter(&config.rate_limit).await?;
    let store = Arc::new(InMemoryVerificationStore::new());

    tracing::info!(
        transport = transport.provider_name(),
        "Infrastructure services initialized successfully"
    );

    Ok(InfrastructureServices {
        transport,
        store,
        rate_limiter,
    })
}

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Redis error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SMTP transport error
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<InfrastructureError> for DomainError {
    fn from(err: InfrastructureError) -> Self {
        match err {
            InfrastructureError::Config(message) => DomainError::Configuration { message },
            InfrastructureError::Cache(e) => DomainError::Storage {
                message: e.to_string(),
            },
            other => DomainError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_shared::{EmailProviderKind, RateLimitConfig};

    #[tokio::test]
    async fn test_initialize_with_defaults() {
        let config = AppConfig::default();
        let services = initialize(&config).await.unwrap();
        assert_eq!(services.transport.provider_name(), "mock");
    }

    #[tokio::test]
    async fn test_initialize_rejects_missing_credentials() {
        let mut config = AppConfig::default();
        config.email.provider = EmailProviderKind::Smtp;
        config.rate_limit = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };

        let result = initialize(&config).await;
        assert!(matches!(result, Err(InfrastructureError::Config(_))));
    }

    #[test]
    fn test_config_error_maps_to_domain_configuration() {
        let err: DomainError = InfrastructureError::Config("SMTP_HOST missing".to_string()).into();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
