//! E-mail Transport Module
//!
//! Transport implementations for delivering rendered verification messages.
//!
//! ## Features
//!
//! - **Mock Implementation**: Logs deliveries and keeps an outbox for development
//! - **SMTP**: Any SMTP relay via lettre
//! - **HTTP API**: JSON e-mail sending APIs (Brevo-style payload)
//! - **Failover**: HTTP API as primary with SMTP as backup
//!
//! Every transport classifies provider failures as transient or permanent and
//! never logs message bodies.

use std::sync::Arc;
use std::time::Duration;

use courier_core::Transport;
use courier_shared::{EmailConfig, EmailProviderKind};

use crate::InfrastructureError;

pub mod failover;
pub mod http_api;
pub mod mock_email;
pub mod smtp;

pub use failover::FailoverTransport;
pub use http_api::HttpApiTransport;
pub use mock_email::{FailureMode, MockEmailTransport};
pub use smtp::SmtpTransport;

/// Sender identity shared by the real transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub name: Option<String>,
}

impl Sender {
    pub fn from_config(config: &EmailConfig) -> Self {
        Self {
            address: config.sender_address.clone(),
            name: config.sender_name.clone(),
        }
    }
}

/// Create the transport selected by the configuration
///
/// Credentials are validated here; a missing value is a configuration error.
pub fn create_transport(config: &EmailConfig) -> Result<Arc<dyn Transport>, InfrastructureError> {
    config
        .validate()
        .map_err(|e| InfrastructureError::Config(e.to_string()))?;

    let transport: Arc<dyn Transport> = match config.provider {
        EmailProviderKind::Mock => Arc::new(MockEmailTransport::new()),
        EmailProviderKind::Smtp => Arc::new(SmtpTransport::from_config(config)?),
        EmailProviderKind::Http => Arc::new(HttpApiTransport::from_config(config)?),
        EmailProviderKind::Failover => Arc::new(FailoverTransport::new(
            Arc::new(HttpApiTransport::from_config(config)?),
            Arc::new(SmtpTransport::from_config(config)?),
            Duration::from_secs(config.failover_cooldown_seconds),
        )),
    };

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_shared::config::{HttpApiSettings, SmtpSettings};

    fn smtp_settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            starttls: false,
        }
    }

    fn http_settings() -> HttpApiSettings {
        HttpApiSettings {
            url: "https://mail.example.com/v3/smtp/email".to_string(),
            api_key: "test-key".to_string(),
        }
    }

    #[test]
    fn test_create_mock_transport() {
        let transport = create_transport(&EmailConfig::default()).unwrap();
        assert_eq!(transport.provider_name(), "mock");
    }

    #[test]
    fn test_create_smtp_transport() {
        let config = EmailConfig {
            provider: EmailProviderKind::Smtp,
            smtp: Some(smtp_settings()),
            ..Default::default()
        };
        let transport = create_transport(&config).unwrap();
        assert_eq!(transport.provider_name(), "smtp");
    }

    #[test]
    fn test_create_failover_transport() {
        let config = EmailConfig {
            provider: EmailProviderKind::Failover,
            smtp: Some(smtp_settings()),
            http_api: Some(http_settings()),
            ..Default::default()
        };
        let transport = create_transport(&config).unwrap();
        assert_eq!(transport.provider_name(), "failover");
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let config = EmailConfig {
            provider: EmailProviderKind::Http,
            ..Default::default()
        };
        assert!(matches!(
            create_transport(&config),
            Err(InfrastructureError::Config(_))
        ));
    }
}
