//! Unit tests for the delivery coordinator

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::{CheckOutcome, DispatchStatus, Purpose, TransportResult};
use crate::errors::DomainError;
use crate::services::verification::{
    DeliveryCoordinator, RetryPolicy, TemplateRenderer, TransportError,
    VerificationServiceConfig, VerificationStore,
};

use super::mocks::{MockRateLimiter, MockStore, ScriptedTransport};

type TestCoordinator = DeliveryCoordinator<ScriptedTransport, MockStore, MockRateLimiter>;

const RECIPIENT: &str = "jane@example.com";

fn fast_config() -> VerificationServiceConfig {
    VerificationServiceConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        },
        send_timeout: Duration::from_secs(1),
        dispatch_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn build(
    transport: Arc<ScriptedTransport>,
    store: Arc<MockStore>,
    config: VerificationServiceConfig,
) -> TestCoordinator {
    DeliveryCoordinator::new(
        transport,
        store,
        Arc::new(MockRateLimiter::unlimited()),
        TemplateRenderer::with_default_templates("Courier"),
        config,
    )
    .unwrap()
}

fn transient(detail: &str) -> TransportError {
    TransportError::Transient(detail.to_string())
}

#[tokio::test]
async fn test_dispatch_delivers_and_records() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Delivered);
    assert_eq!(outcome.send_count(), 1);
    assert_eq!(outcome.attempts[0].transport_result, TransportResult::Sent);
    assert_eq!(outcome.attempts[0].request_id, outcome.request_id);
    assert_eq!(outcome.attempts[0].detail.as_deref(), Some("msg-1"));

    let record = store
        .get_active(RECIPIENT, Purpose::SignupVerify, chrono::Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.id, outcome.request_id);
    assert_eq!(record.expires_at, outcome.expires_at);

    // The code reaches the recipient but is never stored in plaintext
    let code = transport.last_code().unwrap();
    assert_eq!(code.len(), 6);
    assert!(!record.code_hash.contains(&code));
}

#[tokio::test]
async fn test_dispatch_normalises_recipient() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    coordinator
        .dispatch("  Jane@Example.COM ", Purpose::SignupVerify)
        .await
        .unwrap();

    assert_eq!(transport.sent.lock().unwrap()[0].to(), RECIPIENT);
    let outcome = coordinator
        .check_code("JANE@example.com", Purpose::SignupVerify, &transport.last_code().unwrap())
        .await
        .unwrap();
    assert_eq!(outcome, CheckOutcome::Valid);
}

#[tokio::test]
async fn test_repeat_dispatch_within_window_is_debounced() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    let first = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let second = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(first.status, DispatchStatus::Delivered);
    assert_eq!(second.status, DispatchStatus::Debounced);
    assert_eq!(second.request_id, first.request_id);
    assert_eq!(second.send_count(), 0);
    assert_eq!(transport.send_calls(), 1);
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_purposes_are_independent() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    let signup = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let reset = coordinator.dispatch(RECIPIENT, Purpose::PasswordReset).await.unwrap();

    assert_eq!(signup.status, DispatchStatus::Delivered);
    assert_eq!(reset.status, DispatchStatus::Delivered);
    assert_eq!(transport.send_calls(), 2);
}

#[tokio::test]
async fn test_code_is_valid_exactly_once() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store, fast_config());

    coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let code = transport.last_code().unwrap();

    let first = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &code)
        .await
        .unwrap();
    let second = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &code)
        .await
        .unwrap();

    assert_eq!(first, CheckOutcome::Valid);
    assert_eq!(second, CheckOutcome::AlreadyConsumed);
}

#[tokio::test]
async fn test_expired_code_reports_expired() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let code = transport.last_code().unwrap();
    store.expire_all().await;

    let correct = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &code)
        .await
        .unwrap();
    let wrong = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, "not-the-code")
        .await
        .unwrap();

    assert_eq!(correct, CheckOutcome::Expired);
    assert_eq!(wrong, CheckOutcome::Expired);
}

#[tokio::test]
async fn test_new_dispatch_supersedes_previous_code() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let config = VerificationServiceConfig {
        debounce_window_seconds: 0,
        ..fast_config()
    };
    let coordinator = build(transport.clone(), store.clone(), config);

    let first = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let old_code = transport.last_code().unwrap();
    let second = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let new_code = transport.last_code().unwrap();

    assert_eq!(second.status, DispatchStatus::Delivered);
    assert_ne!(first.request_id, second.request_id);
    assert_ne!(old_code, new_code);
    assert_eq!(store.records.read().await.len(), 1);

    let old = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &old_code)
        .await
        .unwrap();
    assert!(matches!(old, CheckOutcome::Invalid | CheckOutcome::Expired));

    let new = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &new_code)
        .await
        .unwrap();
    assert_eq!(new, CheckOutcome::Valid);
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let transport = Arc::new(ScriptedTransport::with_script(
        vec![Err(transient("503")), Err(transient("connection reset"))],
        Ok(()),
    ));
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store, fast_config());

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Delivered);
    assert_eq!(transport.send_calls(), 3);
    let results: Vec<_> = outcome.attempts.iter().map(|a| a.transport_result).collect();
    assert_eq!(
        results,
        vec![
            TransportResult::TransientFailure,
            TransportResult::TransientFailure,
            TransportResult::Sent
        ]
    );
    let numbers: Vec<_> = outcome.attempts.iter().map(|a| a.attempt_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    // Every retry reuses the same rendered message
    let sent = transport.sent.lock().unwrap();
    assert!(sent.iter().all(|m| m == &sent[0]));
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::always_failing(TransportError::Permanent(
        "550 mailbox unavailable".to_string(),
    )));
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store, fast_config());

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Failed);
    assert_eq!(transport.send_calls(), 1);
    assert_eq!(
        outcome.error,
        Some(DomainError::PermanentDelivery {
            message: "550 mailbox unavailable".to_string()
        })
    );
    assert_eq!(outcome.attempts[0].transport_result, TransportResult::PermanentFailure);
}

#[tokio::test]
async fn test_exhausted_retries_fail_but_code_stays_valid() {
    let transport = Arc::new(ScriptedTransport::always_failing(transient("503")));
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store, fast_config());

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Failed);
    assert_eq!(transport.send_calls(), 3);
    assert!(matches!(outcome.error, Some(DomainError::TransientDelivery { .. })));

    let code = transport.last_code().unwrap();
    let check = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &code)
        .await
        .unwrap();
    assert_eq!(check, CheckOutcome::Valid);
}

#[tokio::test]
async fn test_send_timeout_counts_as_transient() {
    let transport = Arc::new(
        ScriptedTransport::succeeding().with_delay(Duration::from_millis(200)),
    );
    let store = Arc::new(MockStore::new(false));
    let mut config = fast_config();
    config.send_timeout = Duration::from_millis(20);
    config.retry.max_attempts = 2;
    let coordinator = build(transport.clone(), store, config);

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Failed);
    assert_eq!(outcome.send_count(), 2);
    assert!(outcome
        .attempts
        .iter()
        .all(|a| a.transport_result == TransportResult::TransientFailure));
}

#[tokio::test]
async fn test_dispatch_timeout_stops_retries_without_aborting_send() {
    let transport = Arc::new(
        ScriptedTransport::always_failing(transient("503")).with_delay(Duration::from_millis(100)),
    );
    let store = Arc::new(MockStore::new(false));
    let mut config = fast_config();
    config.dispatch_timeout = Duration::from_millis(30);
    let coordinator = build(transport.clone(), store.clone(), config);

    let outcome = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();

    assert_eq!(outcome.status, DispatchStatus::Failed);
    match &outcome.error {
        Some(DomainError::TransientDelivery { message }) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {:?}", other),
    }

    // The in-flight send finishes, no retry follows
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(transport.completed_sends(), 1);
    assert_eq!(transport.send_calls(), 1);

    // The issued record is untouched
    assert!(store
        .get_active(RECIPIENT, Purpose::SignupVerify, chrono::Utc::now())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_cancelled_dispatch_stops_retries() {
    let transport = Arc::new(
        ScriptedTransport::always_failing(transient("503")).with_delay(Duration::from_millis(50)),
    );
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    // The caller gives up while the first send is in flight
    let result = tokio::time::timeout(
        Duration::from_millis(20),
        coordinator.dispatch(RECIPIENT, Purpose::SignupVerify),
    )
    .await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.send_calls(), 1);
    assert_eq!(transport.completed_sends(), 1);
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_concurrent_dispatches_send_once() {
    let transport = Arc::new(
        ScriptedTransport::succeeding().with_delay(Duration::from_millis(5)),
    );
    let store = Arc::new(MockStore::new(false));
    let coordinator = Arc::new(build(transport.clone(), store.clone(), fast_config()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await
        }));
    }

    let mut delivered = 0;
    let mut debounced = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap().status {
            DispatchStatus::Delivered => delivered += 1,
            DispatchStatus::Debounced => debounced += 1,
            DispatchStatus::Failed => panic!("unexpected failure"),
        }
    }

    assert_eq!(delivered, 1);
    assert_eq!(debounced, 15);
    assert_eq!(transport.send_calls(), 1);
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.records.read().await.len(), 1);
}

#[tokio::test]
async fn test_rate_limited_dispatch_has_no_side_effects() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let config = VerificationServiceConfig {
        debounce_window_seconds: 0,
        ..fast_config()
    };
    let coordinator = DeliveryCoordinator::new(
        transport.clone(),
        store.clone(),
        Arc::new(MockRateLimiter::with_limit(1)),
        TemplateRenderer::with_default_templates("Courier"),
        config,
    )
    .unwrap();

    coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let result = coordinator.dispatch(RECIPIENT, Purpose::PasswordReset).await;

    assert_eq!(
        result.unwrap_err(),
        DomainError::RateLimited {
            retry_after_seconds: 60
        }
    );
    assert_eq!(transport.send_calls(), 1);
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_invalid_recipient_is_rejected_before_side_effects() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store.clone(), fast_config());

    let result = coordinator.dispatch("not-an-address", Purpose::SignupVerify).await;

    assert!(matches!(result, Err(DomainError::Validation { .. })));
    assert_eq!(transport.send_calls(), 0);
    assert_eq!(store.put_count(), 0);

    let check = coordinator
        .check_code("not-an-address", Purpose::SignupVerify, "123456")
        .await;
    assert!(matches!(check, Err(DomainError::Validation { .. })));
}

#[tokio::test]
async fn test_storage_failure_prevents_send() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(true));
    let coordinator = build(transport.clone(), store, fast_config());

    let result = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await;

    assert!(matches!(result, Err(DomainError::Storage { .. })));
    assert_eq!(transport.send_calls(), 0);
}

#[tokio::test]
async fn test_failed_store_write_gives_back_rate_limit_slot() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let limiter = Arc::new(MockRateLimiter::with_limit(1));
    let coordinator = DeliveryCoordinator::new(
        transport.clone(),
        Arc::new(MockStore::failing_puts()),
        limiter.clone(),
        TemplateRenderer::with_default_templates("Courier"),
        fast_config(),
    )
    .unwrap();

    let result = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await;

    assert!(matches!(result, Err(DomainError::Storage { .. })));
    assert_eq!(transport.send_calls(), 0);
    assert_eq!(limiter.recorded(RECIPIENT), 0);

    // The quota is still available for the retry
    let retry = coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await;
    assert!(matches!(retry, Err(DomainError::Storage { .. })));
}

#[tokio::test]
async fn test_wrong_codes_exhaust_record() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let config = VerificationServiceConfig {
        max_verify_attempts: 2,
        code_alphabet: "0123456789".to_string(),
        ..fast_config()
    };
    let coordinator = build(transport.clone(), store, config);

    coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let code = transport.last_code().unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..2 {
        let outcome = coordinator
            .check_code(RECIPIENT, Purpose::SignupVerify, wrong)
            .await
            .unwrap();
        assert_eq!(outcome, CheckOutcome::Invalid);
    }

    let outcome = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, &code)
        .await
        .unwrap();
    assert_eq!(outcome, CheckOutcome::Invalid);
}

#[tokio::test]
async fn test_unknown_recipient_and_blank_code_are_invalid() {
    let transport = Arc::new(ScriptedTransport::succeeding());
    let store = Arc::new(MockStore::new(false));
    let coordinator = build(transport.clone(), store, fast_config());

    let outcome = coordinator
        .check_code("nobody@example.com", Purpose::SignupVerify, "123456")
        .await
        .unwrap();
    assert_eq!(outcome, CheckOutcome::Invalid);

    coordinator.dispatch(RECIPIENT, Purpose::SignupVerify).await.unwrap();
    let outcome = coordinator
        .check_code(RECIPIENT, Purpose::SignupVerify, "   ")
        .await
        .unwrap();
    assert_eq!(outcome, CheckOutcome::Invalid);
}

#[tokio::test]
async fn test_missing_template_is_configuration_error() {
    let result = DeliveryCoordinator::new(
        Arc::new(ScriptedTransport::succeeding()),
        Arc::new(MockStore::new(false)),
        Arc::new(MockRateLimiter::unlimited()),
        TemplateRenderer::new("Courier"),
        fast_config(),
    );
    assert!(matches!(result, Err(DomainError::Configuration { .. })));
}

#[tokio::test]
async fn test_invalid_code_settings_are_configuration_error() {
    let config = VerificationServiceConfig {
        code_length: 0,
        ..fast_config()
    };
    let result = DeliveryCoordinator::new(
        Arc::new(ScriptedTransport::succeeding()),
        Arc::new(MockStore::new(false)),
        Arc::new(MockRateLimiter::unlimited()),
        TemplateRenderer::with_default_templates("Courier"),
        config,
    );
    assert!(matches!(result, Err(DomainError::Configuration { .. })));
}

#[tokio::test]
async fn test_out_of_range_durations_are_configuration_error() {
    for config in [
        VerificationServiceConfig {
            code_ttl_seconds: 10_000_000_000_000_000,
            ..fast_config()
        },
        VerificationServiceConfig {
            code_ttl_seconds: 0,
            ..fast_config()
        },
        VerificationServiceConfig {
            debounce_window_seconds: i64::MAX,
            ..fast_config()
        },
    ] {
        let result = DeliveryCoordinator::new(
            Arc::new(ScriptedTransport::succeeding()),
            Arc::new(MockStore::new(false)),
            Arc::new(MockRateLimiter::unlimited()),
            TemplateRenderer::with_default_templates("Courier"),
            config,
        );
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
