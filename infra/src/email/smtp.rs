//! SMTP e-mail transport using lettre

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message as MimeMessage, Tokio1Executor,
};
use tracing::{debug, info};

use courier_core::{Message, Transport, TransportError, TransportReceipt};
use courier_shared::utils::email::mask_email;
use courier_shared::EmailConfig;

use super::Sender;
use crate::InfrastructureError;

/// SMTP relay transport
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Create a transport from the `SMTP_*` settings
    pub fn from_config(config: &EmailConfig) -> Result<Self, InfrastructureError> {
        let settings = config
            .smtp
            .as_ref()
            .ok_or_else(|| InfrastructureError::Config("SMTP_HOST is required".to_string()))?;

        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        builder = builder.port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = sender_mailbox(&Sender::from_config(config))?;

        info!(
            host = %settings.host,
            port = settings.port,
            starttls = settings.starttls,
            "SMTP e-mail transport initialized"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &Message) -> Result<MimeMessage, TransportError> {
        let to: Mailbox = message
            .to()
            .parse()
            .map_err(|e| TransportError::Permanent(format!("invalid recipient address: {}", e)))?;

        MimeMessage::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body().to_string())
            .map_err(|e| TransportError::Permanent(format!("could not build message: {}", e)))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError> {
        let email = self.build_message(message)?;

        match self.transport.send(email).await {
            Ok(response) => {
                let message_id = response.message().next().map(|s| s.to_string());
                debug!(
                    recipient = %mask_email(message.to()),
                    code = %response.code(),
                    "SMTP relay accepted message"
                );
                Ok(TransportReceipt::new("smtp", message_id))
            }
            Err(e) => Err(classify_smtp_error(&e)),
        }
    }

    fn provider_name(&self) -> &str {
        "smtp"
    }
}

/// 5xx replies are permanent; 4xx replies, timeouts and connection problems are transient
fn classify_smtp_error(e: &lettre::transport::smtp::Error) -> TransportError {
    if e.is_permanent() {
        TransportError::Permanent(e.to_string())
    } else {
        TransportError::Transient(e.to_string())
    }
}

pub(crate) fn sender_mailbox(sender: &Sender) -> Result<Mailbox, InfrastructureError> {
    let mailbox = match &sender.name {
        Some(name) => format!("{} <{}>", name, sender.address),
        None => sender.address.clone(),
    };

    mailbox
        .parse()
        .map_err(|e| InfrastructureError::Config(format!("Invalid sender address: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_shared::config::SmtpSettings;
    use courier_shared::EmailProviderKind;

    fn config() -> EmailConfig {
        EmailConfig {
            provider: EmailProviderKind::Smtp,
            sender_address: "no-reply@example.com".to_string(),
            sender_name: Some("Courier".to_string()),
            smtp: Some(SmtpSettings {
                host: "localhost".to_string(),
                port: 1025,
                username: None,
                password: None,
                starttls: false,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_smtp_transport_creation() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        assert_eq!(transport.provider_name(), "smtp");
        assert_eq!(transport.from.email.to_string(), "no-reply@example.com");
    }

    #[test]
    fn test_requires_smtp_settings() {
        let config = EmailConfig {
            smtp: None,
            ..config()
        };
        assert!(matches!(
            SmtpTransport::from_config(&config),
            Err(InfrastructureError::Config(_))
        ));
    }

    #[test]
    fn test_sender_mailbox_with_name() {
        let mailbox = sender_mailbox(&Sender {
            address: "no-reply@example.com".to_string(),
            name: Some("Courier".to_string()),
        })
        .unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Courier"));
    }

    #[test]
    fn test_build_message() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        let message = Message::new("jane@example.com", "Your code", "Code: 482913");
        let email = transport.build_message(&message).unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();
        assert!(formatted.contains("Subject: Your code"));
        assert!(formatted.contains("To: jane@example.com"));
    }

    #[test]
    fn test_bad_recipient_is_permanent() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        let message = Message::new("not an address", "Your code", "Code: 482913");
        let err = transport.build_message(&message).unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_transient() {
        let config = EmailConfig {
            smtp: Some(SmtpSettings {
                host: "127.0.0.1".to_string(),
                port: 1,
                username: None,
                password: None,
                starttls: false,
            }),
            ..config()
        };
        let transport = SmtpTransport::from_config(&config).unwrap();
        let message = Message::new("jane@example.com", "Your code", "Code: 482913");

        let err = transport.send(&message).await.unwrap_err();
        assert!(err.is_transient());
    }
}
