//! Verification dispatch module
//!
//! This module provides the complete verification code workflow:
//! - Secure code generation and message rendering
//! - Delivery through a transport with retry and backoff
//! - Debouncing, per-recipient rate limiting and per-key serialization
//! - Code checks with attempt tracking and expiry
//! - Periodic purge of expired records

mod cleanup;
mod code_generator;
mod config;
mod coordinator;
mod key_lock;
mod retry;
mod template;
mod traits;

#[cfg(test)]
mod tests;

pub use cleanup::{CleanupResult, VerificationCleanupService};
pub use code_generator::CodeGenerator;
pub use config::VerificationServiceConfig;
pub use coordinator::DeliveryCoordinator;
pub use key_lock::ShardedLocks;
pub use retry::RetryPolicy;
pub use template::{MessageTemplate, TemplateRenderer};
pub use traits::{
    RateLimitDecision, RateLimiter, Transport, TransportError, TransportReceipt,
    VerificationStore,
};
