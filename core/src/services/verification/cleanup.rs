//! Background purge of expired verification records
//!
//! Expired records are inert but keep memory until removed; this service
//! removes them on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::DomainError;

use super::traits::VerificationStore;

/// Service for purging expired records from a [`VerificationStore`]
pub struct VerificationCleanupService<S: VerificationStore + ?Sized + 'static> {
    store: Arc<S>,
    interval: Duration,
}

impl<S: VerificationStore + ?Sized + 'static> VerificationCleanupService<S> {
    pub fn new(store: Arc<S>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run a single cleanup cycle
    pub async fn run_cleanup(&self) -> Result<CleanupResult, DomainError> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            info!(purged = purged, event = "records_purged", "Purged expired verification records");
        }
        Ok(CleanupResult {
            expired_records_purged: purged,
        })
    }

    /// Start the cleanup service as a background task
    ///
    /// A zero interval disables the task; `None` is returned in that case.
    pub fn start_background_task(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.interval.is_zero() {
            warn!("Verification record cleanup is disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            info!(
                interval_seconds = self.interval.as_secs(),
                "Verification record cleanup started"
            );

            let mut interval_timer = tokio::time::interval(self.interval);
            // The first tick completes immediately
            interval_timer.tick().await;

            loop {
                interval_timer.tick().await;

                if let Err(e) = self.run_cleanup().await {
                    error!(error = %e, "Verification record cleanup cycle failed");
                }
            }
        }))
    }
}

/// Result of a cleanup cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupResult {
    /// Number of expired records removed
    pub expired_records_purged: usize,
}
