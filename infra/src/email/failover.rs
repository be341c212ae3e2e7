//! Failover e-mail transport
//!
//! Sends through a primary transport and falls back to a backup when the
//! primary reports a transient failure. After a failure the primary is skipped
//! until the cooldown has elapsed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use courier_core::{Message, Transport, TransportError, TransportReceipt};

#[derive(Debug, Clone, Default)]
struct FailoverState {
    using_backup: bool,
    last_primary_failure: Option<Instant>,
    primary_failure_count: u32,
}

/// Transport with automatic failover from primary to backup
pub struct FailoverTransport {
    primary: Arc<dyn Transport>,
    backup: Arc<dyn Transport>,
    state: RwLock<FailoverState>,
    cooldown: Duration,
}

impl FailoverTransport {
    /// # Arguments
    ///
    /// * `primary` - Transport tried first
    /// * `backup` - Transport used while the primary is cooling down
    /// * `cooldown` - How long to wait before trying the primary again
    pub fn new(primary: Arc<dyn Transport>, backup: Arc<dyn Transport>, cooldown: Duration) -> Self {
        info!(
            primary = primary.provider_name(),
            backup = backup.provider_name(),
            cooldown_secs = cooldown.as_secs(),
            "Initializing failover e-mail transport"
        );

        Self {
            primary,
            backup,
            state: RwLock::new(FailoverState::default()),
            cooldown,
        }
    }

    async fn should_try_primary(&self) -> bool {
        let state = self.state.read().await;
        if !state.using_backup {
            return true;
        }
        state
            .last_primary_failure
            .map_or(true, |at| at.elapsed() >= self.cooldown)
    }

    async fn record_primary_failure(&self) {
        let mut state = self.state.write().await;
        state.primary_failure_count += 1;
        state.last_primary_failure = Some(Instant::now());

        if !state.using_backup {
            warn!(
                primary = self.primary.provider_name(),
                backup = self.backup.provider_name(),
                failures = state.primary_failure_count,
                event = "transport_failover",
                "Primary e-mail transport failed, switching to backup"
            );
            state.using_backup = true;
        }
    }

    async fn record_primary_success(&self) {
        let mut state = self.state.write().await;
        if state.using_backup {
            info!(
                primary = self.primary.provider_name(),
                event = "transport_recovered",
                "Primary e-mail transport recovered"
            );
        }
        *state = FailoverState::default();
    }
}

#[async_trait]
impl Transport for FailoverTransport {
    async fn send(&self, message: &Message) -> Result<TransportReceipt, TransportError> {
        if self.should_try_primary().await {
            match self.primary.send(message).await {
                Ok(receipt) => {
                    self.record_primary_success().await;
                    return Ok(receipt);
                }
                // A rejected message would be rejected by the backup too
                Err(err @ TransportError::Permanent(_)) => return Err(err),
                Err(err) => {
                    warn!(
                        primary = self.primary.provider_name(),
                        error = %err,
                        "Primary e-mail transport failed"
                    );
                    self.record_primary_failure().await;
                }
            }
        }

        self.backup.send(message).await.map_err(|err| {
            warn!(
                backup = self.backup.provider_name(),
                error = %err,
                "Backup e-mail transport failed"
            );
            err
        })
    }

    fn provider_name(&self) -> &str {
        "failover"
    }
}
