//! Verification purposes a code can be issued for.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Why a verification code is being sent
///
/// Each purpose has its own template and its own outstanding record per
/// recipient, so a password reset never supersedes a pending signup code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    SignupVerify,
    PasswordReset,
    EmailChange,
}

impl Purpose {
    /// Every purpose, used to check template coverage at startup
    pub const ALL: [Purpose; 3] = [
        Purpose::SignupVerify,
        Purpose::PasswordReset,
        Purpose::EmailChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::SignupVerify => "signup_verify",
            Purpose::PasswordReset => "password_reset",
            Purpose::EmailChange => "email_change",
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Purpose {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "signup_verify" | "signup" => Ok(Purpose::SignupVerify),
            "password_reset" => Ok(Purpose::PasswordReset),
            "email_change" => Ok(Purpose::EmailChange),
            other => Err(DomainError::Validation {
                message: format!("Unknown verification purpose: {}", other),
            }),
        }
    }
}
