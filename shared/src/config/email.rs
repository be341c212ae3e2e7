//! E-mail transport configuration module

use serde::{Deserialize, Serialize};

use super::{env_opt, env_parse, ConfigError};
use crate::utils::email::is_valid_email;

/// Which transport implementation delivers messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    /// Log-only transport for development
    Mock,
    /// SMTP relay
    Smtp,
    /// HTTP JSON e-mail API
    Http,
    /// HTTP API as primary with SMTP as backup
    Failover,
}

impl Default for EmailProviderKind {
    fn default() -> Self {
        EmailProviderKind::Mock
    }
}

impl std::str::FromStr for EmailProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(EmailProviderKind::Mock),
            "smtp" => Ok(EmailProviderKind::Smtp),
            "http" | "api" => Ok(EmailProviderKind::Http),
            "failover" => Ok(EmailProviderKind::Failover),
            other => Err(ConfigError::invalid(
                "EMAIL_PROVIDER",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for EmailProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailProviderKind::Mock => write!(f, "mock"),
            EmailProviderKind::Smtp => write!(f, "smtp"),
            EmailProviderKind::Http => write!(f, "http"),
            EmailProviderKind::Failover => write!(f, "failover"),
        }
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
}

/// HTTP e-mail API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpApiSettings {
    /// Endpoint accepting the JSON send request
    pub url: String,
    pub api_key: String,
}

/// E-mail transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Transport provider
    #[serde(default)]
    pub provider: EmailProviderKind,

    /// Sender address used in the From header
    pub sender_address: String,

    /// Optional sender display name
    #[serde(default)]
    pub sender_name: Option<String>,

    /// Product name rendered into message templates
    pub app_name: String,

    /// SMTP settings (required for `smtp` and `failover`)
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,

    /// HTTP API settings (required for `http` and `failover`)
    #[serde(default)]
    pub http_api: Option<HttpApiSettings>,

    /// Seconds before a failed primary is tried again (failover only)
    #[serde(default = "default_failover_cooldown")]
    pub failover_cooldown_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: EmailProviderKind::Mock,
            sender_address: String::from("no-reply@localhost.localdomain"),
            sender_name: None,
            app_name: String::from("Courier"),
            smtp: None,
            http_api: None,
            failover_cooldown_seconds: default_failover_cooldown(),
        }
    }
}

impl EmailConfig {
    /// Create from environment variables
    ///
    /// An unknown `EMAIL_PROVIDER` value is kept as `Mock` here and reported by
    /// [`EmailConfig::provider_from_env`] so startup can fail loudly.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let smtp = env_opt("SMTP_HOST").map(|host| SmtpSettings {
            host,
            port: env_parse("SMTP_PORT", 587),
            username: env_opt("SMTP_USERNAME"),
            password: env_opt("SMTP_PASSWORD"),
            starttls: env_parse("SMTP_STARTTLS", true),
        });

        let http_api = match (env_opt("EMAIL_API_URL"), env_opt("EMAIL_API_KEY")) {
            (Some(url), Some(api_key)) => Some(HttpApiSettings { url, api_key }),
            (Some(url), None) => Some(HttpApiSettings {
                url,
                api_key: String::new(),
            }),
            _ => None,
        };

        Self {
            provider: Self::provider_from_env().unwrap_or_default(),
            sender_address: env_opt("EMAIL_SENDER_ADDRESS").unwrap_or(defaults.sender_address),
            sender_name: env_opt("EMAIL_SENDER_NAME"),
            app_name: env_opt("APP_NAME").unwrap_or(defaults.app_name),
            smtp,
            http_api,
            failover_cooldown_seconds: env_parse(
                "EMAIL_FAILOVER_COOLDOWN_SECONDS",
                defaults.failover_cooldown_seconds,
            ),
        }
    }

    /// Parse `EMAIL_PROVIDER`, defaulting to `mock` when unset
    pub fn provider_from_env() -> Result<EmailProviderKind, ConfigError> {
        match env_opt("EMAIL_PROVIDER") {
            Some(value) => value.parse(),
            None => Ok(EmailProviderKind::Mock),
        }
    }

    /// Ensure the selected provider has the credentials it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_email(&self.sender_address) {
            return Err(ConfigError::invalid(
                "EMAIL_SENDER_ADDRESS",
                "must be a valid e-mail address",
            ));
        }

        match self.provider {
            EmailProviderKind::Mock => Ok(()),
            EmailProviderKind::Smtp => self.validate_smtp(),
            EmailProviderKind::Http => self.validate_http_api(),
            EmailProviderKind::Failover => {
                self.validate_http_api()?;
                self.validate_smtp()
            }
        }
    }

    fn validate_smtp(&self) -> Result<(), ConfigError> {
        let smtp = self
            .smtp
            .as_ref()
            .ok_or_else(|| ConfigError::missing("SMTP_HOST"))?;
        match (&smtp.username, &smtp.password) {
            (Some(_), None) => Err(ConfigError::missing("SMTP_PASSWORD")),
            (None, Some(_)) => Err(ConfigError::missing("SMTP_USERNAME")),
            _ => Ok(()),
        }
    }

    fn validate_http_api(&self) -> Result<(), ConfigError> {
        let api = self
            .http_api
            .as_ref()
            .ok_or_else(|| ConfigError::missing("EMAIL_API_URL"))?;
        if api.api_key.is_empty() {
            return Err(ConfigError::missing("EMAIL_API_KEY"));
        }
        if !api.url.starts_with("https://") && !api.url.starts_with("http://") {
            return Err(ConfigError::invalid("EMAIL_API_URL", "must be an http(s) URL"));
        }
        Ok(())
    }
}

fn default_failover_cooldown() -> u64 {
    30
}
