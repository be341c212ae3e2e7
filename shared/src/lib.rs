//! Shared utilities and common types for the Courier services
//!
//! This crate provides common functionality used across all server modules:
//! - Configuration types loaded from the environment
//! - Error response structures
//! - Utility functions (e-mail address validation and masking)

pub mod config;
pub mod errors;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, ConfigError, DispatchConfig, EmailConfig, EmailProviderKind, Environment,
    LoggingConfig, RateLimitConfig, ServerConfig,
};
pub use errors::{error_codes, ErrorResponse};
pub use utils::email;
