//! In-process verification record store
//!
//! Holds at most one record per (recipient, purpose). Consumed records are kept
//! so a repeated check reports `AlreadyConsumed`, and expired ones are kept for
//! one further lifetime so a late check reports `Expired`; the cleanup task
//! removes them afterwards.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use courier_core::{CheckOutcome, DomainResult, Purpose, VerificationRecord, VerificationStore};

type RecordKey = (String, Purpose);

/// Verification store backed by a `HashMap` behind an async `RwLock`
#[derive(Default)]
pub struct InMemoryVerificationStore {
    records: RwLock<HashMap<RecordKey, VerificationRecord>>,
}

impl InMemoryVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, including consumed ones
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn key(recipient: &str, purpose: Purpose) -> RecordKey {
        (recipient.to_string(), purpose)
    }
}

#[async_trait]
impl VerificationStore for InMemoryVerificationStore {
    async fn put(&self, record: VerificationRecord) -> DomainResult<()> {
        let key = Self::key(&record.recipient, record.purpose);
        self.records.write().await.insert(key, record);
        Ok(())
    }

    async fn invalidate(&self, recipient: &str, purpose: Purpose) -> DomainResult<bool> {
        let mut records = self.records.write().await;
        let key = Self::key(recipient, purpose);

        let superseded = matches!(records.get(&key), Some(record) if !record.consumed);
        if superseded {
            records.remove(&key);
        }
        Ok(superseded)
    }

    async fn get_active(
        &self,
        recipient: &str,
        purpose: Purpose,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<VerificationRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&Self::key(recipient, purpose))
            .filter(|record| record.is_active_at(now))
            .cloned())
    }

    async fn consume(
        &self,
        recipient: &str,
        purpose: Purpose,
        submitted_code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<CheckOutcome> {
        // Attempt counting and the consumed flag change under one write lock
        let mut records = self.records.write().await;
        Ok(match records.get_mut(&Self::key(recipient, purpose)) {
            Some(record) => record.check(submitted_code, now),
            None => CheckOutcome::Invalid,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> DomainResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_purgeable_at(now));
        let purged = before - records.len();

        if purged > 0 {
            debug!(purged = purged, remaining = records.len(), "Purged expired verification records");
        }
        Ok(purged)
    }
}
