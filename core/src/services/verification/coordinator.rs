//! Delivery coordinator: generate, render, record, send with retry

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing;
use uuid::Uuid;

use courier_shared::utils::email::{is_valid_email, mask_email, normalize_email};

use crate::domain::entities::{
    CheckOutcome, DeliveryAttempt, DispatchOutcome, Message, Purpose, TransportResult,
    VerificationRecord, VerificationRequest,
};
use crate::errors::{DomainError, DomainResult};

use super::code_generator::CodeGenerator;
use super::config::VerificationServiceConfig;
use super::key_lock::ShardedLocks;
use super::retry::RetryPolicy;
use super::template::TemplateRenderer;
use super::traits::{RateLimitDecision, RateLimiter, Transport, TransportError, VerificationStore};

/// Regeneration attempts when a new code collides with the superseded one
const MAX_CODE_COLLISIONS: usize = 4;

/// Orchestrates a dispatch from idempotency check to terminal delivery state
///
/// Per (recipient, purpose) key, the debounce check, rate limit, supersession
/// and store write run under a sharded lock. Sending happens after the lock is
/// released, inside a spawned task so that a dispatch timeout or a dropped
/// caller stops further retries without cutting an in-flight send short.
pub struct DeliveryCoordinator<T: ?Sized, S: ?Sized, R: ?Sized> {
    /// Transport delivering rendered messages
    transport: Arc<T>,
    /// Store of issued records
    store: Arc<S>,
    /// Per-recipient quota
    rate_limiter: Arc<R>,
    generator: CodeGenerator,
    renderer: TemplateRenderer,
    locks: ShardedLocks,
    config: VerificationServiceConfig,
}

impl<T, S, R> DeliveryCoordinator<T, S, R>
where
    T: Transport + ?Sized + 'static,
    S: VerificationStore + ?Sized,
    R: RateLimiter + ?Sized,
{
    /// Create a coordinator
    ///
    /// # Returns
    ///
    /// * `Err(DomainError::Configuration)` - if the code settings or durations are
    ///   invalid, or a purpose has no template
    pub fn new(
        transport: Arc<T>,
        store: Arc<S>,
        rate_limiter: Arc<R>,
        renderer: TemplateRenderer,
        config: VerificationServiceConfig,
    ) -> DomainResult<Self> {
        config.validate()?;
        let generator = CodeGenerator::new(&config.code_alphabet, config.code_length)?;
        renderer.ensure_purposes(&Purpose::ALL)?;

        let worst_case = config
            .send_timeout
            .checked_mul(config.retry.max_attempts)
            .and_then(|sends| sends.checked_add(config.retry.worst_case_total_delay()))
            .unwrap_or(Duration::MAX);
        if worst_case > config.dispatch_timeout {
            tracing::warn!(
                worst_case_ms = worst_case.as_millis() as u64,
                dispatch_timeout_ms = config.dispatch_timeout.as_millis() as u64,
                "Dispatch timeout is shorter than a full retry sequence; late attempts will be skipped"
            );
        }

        Ok(Self {
            transport,
            store,
            rate_limiter,
            generator,
            renderer,
            locks: ShardedLocks::new(config.lock_shards),
            config,
        })
    }

    pub fn config(&self) -> &VerificationServiceConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &str {
        self.transport.provider_name()
    }

    /// Generate, record and deliver a verification code
    ///
    /// This method:
    /// 1. Normalises and validates the recipient
    /// 2. Returns `Debounced` if a code for the key was issued within the debounce window
    /// 3. Generates and renders the code
    /// 4. Applies the per-recipient rate limit
    /// 5. Supersedes the previous record and stores the new one, giving the rate
    ///    limit slot back if that fails
    /// 6. Sends the message, retrying transient failures with backoff
    ///
    /// # Returns
    ///
    /// * `Ok(DispatchOutcome)` - `Delivered`, `Failed` (the stored code stays valid) or `Debounced`
    /// * `Err(DomainError)` - validation, rate limit, template, entropy or storage failure;
    ///   nothing was sent
    pub async fn dispatch(&self, recipient: &str, purpose: Purpose) -> DomainResult<DispatchOutcome> {
        let request = VerificationRequest::new(recipient, purpose)?;
        let masked = mask_email(&request.recipient);

        let (record_id, expires_at, message) = {
            let _guard = self.locks.lock(&(request.recipient.as_str(), purpose)).await;
            let now = Utc::now();

            let existing = self
                .store
                .get_active(&request.recipient, purpose, now)
                .await?;

            if let Some(existing) = &existing {
                if existing.is_within_window(now, self.config.debounce_window()) {
                    tracing::info!(
                        recipient = %masked,
                        purpose = %purpose,
                        request_id = %existing.id,
                        event = "dispatch_debounced",
                        "Verification code sent recently, skipping dispatch"
                    );
                    return Ok(DispatchOutcome::debounced(existing.id, existing.expires_at));
                }
            }

            let code = self.fresh_code(existing.as_ref())?;
            let message = self.renderer.render(
                purpose,
                &request.recipient,
                &code,
                self.config.code_ttl_seconds,
            )?;
            let record = VerificationRecord::issue(
                request.recipient.clone(),
                purpose,
                &code,
                now,
                self.config.code_ttl(),
                self.config.max_verify_attempts,
            );
            let (record_id, expires_at) = (record.id, record.expires_at);

            if let RateLimitDecision::Limited {
                retry_after_seconds,
            } = self.rate_limiter.check_and_record(&request.recipient).await?
            {
                tracing::warn!(
                    recipient = %masked,
                    purpose = %purpose,
                    retry_after_seconds = retry_after_seconds,
                    event = "dispatch_rate_limited",
                    "Per-recipient dispatch limit exceeded"
                );
                return Err(DomainError::RateLimited {
                    retry_after_seconds,
                });
            }

            let superseded = match self.store_record(record).await {
                Ok(superseded) => superseded,
                Err(e) => {
                    self.release_slot(&request.recipient, &masked).await;
                    return Err(e);
                }
            };

            tracing::info!(
                recipient = %masked,
                purpose = %purpose,
                request_id = %record_id,
                superseded = superseded,
                expires_at = %expires_at,
                event = "code_issued",
                "Issued verification code"
            );

            (record_id, expires_at, message)
        };

        let (attempts, failure) = self.deliver(record_id, message).await;

        match failure {
            None => {
                tracing::info!(
                    recipient = %masked,
                    purpose = %purpose,
                    request_id = %record_id,
                    attempts = attempts.len(),
                    provider = self.transport.provider_name(),
                    event = "dispatch_delivered",
                    "Verification message delivered"
                );
                Ok(DispatchOutcome::delivered(record_id, expires_at, attempts))
            }
            Some(error) => {
                tracing::error!(
                    recipient = %masked,
                    purpose = %purpose,
                    request_id = %record_id,
                    attempts = attempts.len(),
                    error = %error,
                    event = "dispatch_failed",
                    "Verification message could not be delivered"
                );
                Ok(DispatchOutcome::failed(record_id, expires_at, attempts, error))
            }
        }
    }

    /// Check a submitted code for a recipient and purpose
    ///
    /// Unknown keys and wrong codes are `Invalid`; only a malformed recipient
    /// address is an error.
    pub async fn check_code(
        &self,
        recipient: &str,
        purpose: Purpose,
        submitted_code: &str,
    ) -> DomainResult<CheckOutcome> {
        let recipient = normalize_email(recipient);
        if !is_valid_email(&recipient) {
            return Err(DomainError::Validation {
                message: "Invalid recipient address".to_string(),
            });
        }

        let submitted_code = submitted_code.trim();
        let outcome = if submitted_code.is_empty() {
            CheckOutcome::Invalid
        } else {
            self.store
                .consume(&recipient, purpose, submitted_code, Utc::now())
                .await?
        };

        let masked = mask_email(&recipient);
        match outcome {
            CheckOutcome::Valid => tracing::info!(
                recipient = %masked,
                purpose = %purpose,
                event = "code_verified",
                "Verification code accepted"
            ),
            other => tracing::warn!(
                recipient = %masked,
                purpose = %purpose,
                outcome = ?other,
                event = "code_rejected",
                "Verification code rejected"
            ),
        }

        Ok(outcome)
    }

    /// Supersede the key's unconsumed record and store `record` in its place
    async fn store_record(&self, record: VerificationRecord) -> DomainResult<bool> {
        let superseded = self.store.invalidate(&record.recipient, record.purpose).await?;
        self.store.put(record).await?;
        Ok(superseded)
    }

    async fn release_slot(&self, recipient: &str, masked: &str) {
        if let Err(e) = self.rate_limiter.release(recipient).await {
            tracing::warn!(
                recipient = %masked,
                error = %e,
                event = "rate_limit_release_failed",
                "Could not give back the rate limit slot of a failed dispatch"
            );
        }
    }

    /// Generate a code that differs from the one held by `superseded`
    fn fresh_code(&self, superseded: Option<&VerificationRecord>) -> DomainResult<String> {
        for _ in 0..MAX_CODE_COLLISIONS {
            let code = self.generator.generate()?;
            match superseded {
                Some(previous) if previous.matches_code(&code) => continue,
                _ => return Ok(code),
            }
        }
        Err(DomainError::Internal {
            message: "could not generate a code distinct from the previous one".to_string(),
        })
    }

    /// Run the send sequence in its own task, bounded by the dispatch timeout
    ///
    /// Returns the attempts made so far and the failure, if any.
    async fn deliver(
        &self,
        request_id: Uuid,
        message: Message,
    ) -> (Vec<DeliveryAttempt>, Option<DomainError>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        // Dropping the sender (caller cancelled) also stops retries
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(run_delivery(
            Arc::clone(&self.transport),
            message,
            request_id,
            self.config.retry.clone(),
            self.config.send_timeout,
            cancel_rx,
            Arc::clone(&log),
        ));

        let failure = match tokio::time::timeout(self.config.dispatch_timeout, handle).await {
            Ok(Ok(result)) => result.err(),
            Ok(Err(join_error)) => Some(DomainError::Internal {
                message: format!("delivery task failed: {}", join_error),
            }),
            Err(_) => {
                let _ = cancel_tx.send(true);
                tracing::warn!(
                    request_id = %request_id,
                    timeout_ms = self.config.dispatch_timeout.as_millis() as u64,
                    event = "dispatch_timeout",
                    "Dispatch timed out, no further attempts will be made"
                );
                Some(DomainError::TransientDelivery {
                    message: format!(
                        "dispatch timed out after {} ms",
                        self.config.dispatch_timeout.as_millis()
                    ),
                })
            }
        };

        let attempts = log.lock().await.clone();
        (attempts, failure)
    }
}

/// Send with per-attempt timeout and exponential backoff
async fn run_delivery<T: Transport + ?Sized>(
    transport: Arc<T>,
    message: Message,
    request_id: Uuid,
    policy: RetryPolicy,
    send_timeout: Duration,
    mut cancel: watch::Receiver<bool>,
    log: Arc<Mutex<Vec<DeliveryAttempt>>>,
) -> DomainResult<()> {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(send_timeout, transport.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Transient(format!(
                "send timed out after {} ms",
                send_timeout.as_millis()
            ))),
        };

        let (transport_result, detail) = match &result {
            Ok(receipt) => (TransportResult::Sent, receipt.message_id.clone()),
            Err(err) if err.is_transient() => {
                (TransportResult::TransientFailure, Some(err.detail().to_string()))
            }
            Err(err) => (TransportResult::PermanentFailure, Some(err.detail().to_string())),
        };
        log.lock().await.push(DeliveryAttempt {
            request_id,
            transport_result,
            attempt_number: attempt,
            timestamp: Utc::now(),
            detail,
        });

        let err = match result {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        tracing::warn!(
            request_id = %request_id,
            attempt = attempt,
            max_attempts = policy.max_attempts,
            provider = transport.provider_name(),
            error = %err,
            event = "delivery_attempt_failed",
            "Delivery attempt failed"
        );

        if !policy.should_retry(attempt, &err) {
            return Err(match err {
                TransportError::Transient(detail) => DomainError::TransientDelivery {
                    message: format!("gave up after {} attempts: {}", attempt, detail),
                },
                permanent => permanent.into(),
            });
        }

        if is_cancelled(&cancel) {
            return Err(cancelled_error(attempt));
        }

        let delay = policy.delay_for(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => return Err(cancelled_error(attempt)),
        }
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow() || cancel.has_changed().is_err()
}

fn cancelled_error(attempt: u32) -> DomainError {
    DomainError::TransientDelivery {
        message: format!("dispatch cancelled after {} attempts", attempt),
    }
}
