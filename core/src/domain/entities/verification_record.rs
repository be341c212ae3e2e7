//! Verification record entity: the stored side of an issued code.

use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::delivery::CheckOutcome;
use super::purpose::Purpose;

/// Default lifetime of an issued code (10 minutes)
pub const DEFAULT_TTL_SECONDS: i64 = 600;

/// Default number of checks before a record is exhausted
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// An issued verification code, stored as a digest
///
/// The plaintext code is never kept; `code_hash` is SHA-256 over the record id
/// and the code, so equal codes issued to different records hash differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Opaque identifier, also reported as the dispatch request id
    pub id: Uuid,

    /// Normalised recipient address
    pub recipient: String,

    pub purpose: Purpose,

    /// Hex-encoded digest of the code
    pub code_hash: String,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Set once a matching check succeeds
    pub consumed: bool,

    /// Number of checks made against this record
    pub attempts: u32,

    /// Checks allowed before the record is exhausted
    pub max_attempts: u32,
}

impl VerificationRecord {
    /// Create a record for a freshly generated code
    ///
    /// # Arguments
    ///
    /// * `recipient` - Normalised recipient address
    /// * `purpose` - Purpose the code was issued for
    /// * `code` - Plaintext code; only its digest is retained
    /// * `issued_at` - Creation time
    /// * `ttl` - Lifetime of the code
    /// * `max_attempts` - Checks allowed before exhaustion
    pub fn issue(
        recipient: impl Into<String>,
        purpose: Purpose,
        code: &str,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        max_attempts: u32,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            recipient: recipient.into(),
            purpose,
            code_hash: Self::hash_code(&id, code),
            created_at: issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
            attempts: 0,
            max_attempts,
        }
    }

    /// Digest of a code bound to a record id
    pub fn hash_code(id: &Uuid, code: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hasher.update(code.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Compare a code against the stored digest in constant time
    pub fn matches_code(&self, code: &str) -> bool {
        let candidate = Self::hash_code(&self.id, code);
        constant_time_eq(candidate.as_bytes(), self.code_hash.as_bytes())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_attempts() == 0
    }

    /// Whether the record may be dropped from the store
    ///
    /// Records are retained for one further lifetime after expiry so that late
    /// checks still report `Expired` rather than `Invalid`.
    pub fn is_purgeable_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at + (self.expires_at - self.created_at)
    }

    /// Whether the record still blocks a new code for its key
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && !self.is_expired_at(now) && !self.is_exhausted()
    }

    /// Whether the record was created less than `window` ago
    pub fn is_within_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now < self.created_at + window
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    /// Check a submitted code, updating attempt and consumption state
    ///
    /// Expired records report `Expired` whatever their state, consumed ones
    /// `AlreadyConsumed`; neither counts an attempt. Exhausted records are
    /// `Invalid` from then on.
    pub fn check(&mut self, submitted_code: &str, now: DateTime<Utc>) -> CheckOutcome {
        if self.is_expired_at(now) {
            return CheckOutcome::Expired;
        }
        if self.consumed {
            return CheckOutcome::AlreadyConsumed;
        }
        if self.is_exhausted() {
            return CheckOutcome::Invalid;
        }

        self.attempts += 1;
        if self.matches_code(submitted_code) {
            self.consumed = true;
            CheckOutcome::Valid
        } else {
            CheckOutcome::Invalid
        }
    }
}
