//! Mock E-mail Transport Implementation
//!
//! A transport for development and testing. Messages are kept in an in-memory
//! outbox instead of being sent; only the masked recipient and subject are
//! logged.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use courier_core::{Message, Transport, TransportError, TransportReceipt};
use courier_shared::utils::email::mask_email;

/// Failure the mock should simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    None,
    Transient,
    Permanent,
}

/// Mock e-mail transport for development and testing
///
/// This implementation:
/// - Records every accepted message in an outbox
/// - Generates mock message IDs
/// - Can simulate transient or permanent provider failures
#[derive(Clone)]
pub struct MockEmailTransport {
    /// Counter for tracking number of messages sent
    message_count: Arc<AtomicU64>,
    outbox: Arc<Mutex<Vec<Message>>>,
    failure_mode: FailureMode,
}

impl MockEmailTransport {
    pub fn new() -> Self {
        Self::with_failure_mode(FailureMode::None)
    }

    pub fn with_failure_mode(failure_mode: FailureMode) -> Self {
        Self {
            message_count: Arc::new(AtomicU64::new(0)),
            outbox: Arc::new(Mutex::new(Vec::new())),
            failure_mode,
        }
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    /// Messages accepted so far, oldest first
    pub async fn outbox(&self) -> Vec<Message> {
        self.outbox.lock().await.clone()
    }

    /// Most recent message sent to `recipient`
    pub async fn last_message_to(&self, recipient: &str) -> Option<Message> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to() == recipient)
            .cloned()
    }
}

impl Default for MockEmailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockEmailTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError> {
        let masked = mask_email(message.to());

        match self.failure_mode {
            FailureMode::None => {}
            FailureMode::Transient => {
                warn!(recipient = %masked, "Mock e-mail transport simulating transient failure");
                return Err(TransportError::Transient(
                    "simulated provider unavailability".to_string(),
                ));
            }
            FailureMode::Permanent => {
                warn!(recipient = %masked, "Mock e-mail transport simulating permanent failure");
                return Err(TransportError::Permanent(
                    "simulated recipient rejection".to_string(),
                ));
            }
        }

        let message_id = format!("mock_{}", Uuid::new_v4());
        let count = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.outbox.lock().await.push(message.clone());

        info!(
            target: "email_transport",
            provider = "mock",
            recipient = %masked,
            subject = message.subject(),
            message_id = %message_id,
            count = count,
            "Mock e-mail accepted"
        );

        Ok(TransportReceipt::new("mock", Some(message_id)))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
