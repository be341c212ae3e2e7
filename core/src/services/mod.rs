//! Business services containing the dispatch pipeline.

pub mod verification;

// Re-export commonly used types
pub use verification::{
    CleanupResult, CodeGenerator, DeliveryCoordinator, MessageTemplate, RateLimitDecision,
    RateLimiter, RetryPolicy, ShardedLocks, TemplateRenderer, Transport, TransportError,
    TransportReceipt, VerificationCleanupService, VerificationServiceConfig, VerificationStore,
};
