//! Domain entities of the verification pipeline.

pub mod delivery;
pub mod message;
pub mod purpose;
pub mod verification_record;

// Re-export commonly used types
pub use delivery::{
    CheckOutcome, DeliveryAttempt, DispatchOutcome, DispatchStatus, TransportResult,
    VerificationRequest,
};
pub use message::Message;
pub use purpose::Purpose;
pub use verification_record::{VerificationRecord, DEFAULT_MAX_ATTEMPTS, DEFAULT_TTL_SECONDS};
