//! Integration tests for the dispatch core

#![allow(clippy::unwrap_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_dispatch::{
    CircuitBreakerConfig, DeliveryError, DispatchConfig, DispatchCore, DispatchOutcome,
    DispatchQueryService, Message, ProviderEntry, ProviderTransport, RateLimitConfig, RetryPolicy,
    Signal,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Transport that always fails, counting its invocations.
#[derive(Default)]
struct FailingTransport {
    calls: AtomicU32,
}

#[async_trait]
impl ProviderTransport for FailingTransport {
    async fn send(&self, _message: &Message) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::ConnectionFailed(
            "connection refused".to_string(),
        ))
    }
}

/// Transport that always succeeds, counting its invocations.
#[derive(Default)]
struct SucceedingTransport {
    calls: AtomicU32,
}

#[async_trait]
impl ProviderTransport for SucceedingTransport {
    async fn send(&self, _message: &Message) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport that succeeds slowly, recording start/end events per message
/// so interleaving would be visible.
#[derive(Default)]
struct RecordingTransport {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl ProviderTransport for RecordingTransport {
    async fn send(&self, message: &Message) -> Result<(), DeliveryError> {
        self.events.lock().push(format!("start:{}", message.id));
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.events.lock().push(format!("end:{}", message.id));
        Ok(())
    }
}

fn message(id: &str) -> Message {
    Message::new(id, "user@example.com", "Hello", "Body").unwrap()
}

/// Fast, deterministic config: R=2 retries (3 attempts per provider), no
/// jitter, breaker threshold 3, rate limit 5 per 60s window.
fn test_config() -> DispatchConfig {
    DispatchConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
        },
        breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown_ms: 60_000,
            provider_overrides: ahash::AHashMap::default(),
        },
        rate_limit: RateLimitConfig {
            limit: 5,
            window_ms: 60_000,
            client_overrides: ahash::AHashMap::default(),
        },
    }
}

fn build_core(
    config: DispatchConfig,
    providers: Vec<(&str, Arc<dyn ProviderTransport>)>,
) -> Arc<DispatchCore> {
    let entries = providers
        .into_iter()
        .map(|(name, transport)| {
            ProviderEntry::new(name, transport, &config.breaker.for_provider(name))
        })
        .collect();
    Arc::new(DispatchCore::new(config, entries))
}

/// Spawn the consumer task; returns the shutdown sender.
fn spawn_consumer(core: &Arc<DispatchCore>) -> broadcast::Sender<Signal> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let serving = core.clone();
    tokio::spawn(async move {
        let _ = serving.serve(shutdown_rx).await;
    });
    shutdown_tx
}

#[tokio::test]
async fn test_end_to_end_fallback_and_idempotency() {
    // Providers [A: fails always, B: succeeds always], retries=2,
    // threshold=3, rate limit=5/window.
    let a = Arc::new(FailingTransport::default());
    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(
        test_config(),
        vec![("provider-a", a.clone()), ("provider-b", b.clone())],
    );
    let _shutdown = spawn_consumer(&core);

    let outcome = core
        .submit("client-1", message("e1"))
        .outcome()
        .await
        .unwrap();

    // A exhausted its 3 attempts, then B succeeded on the 4th overall
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            provider: "provider-b".to_string(),
            attempts: 4
        }
    );
    assert_eq!(a.calls.load(Ordering::SeqCst), 3);
    assert_eq!(b.calls.load(Ordering::SeqCst), 1);

    // Resubmission returns the identical outcome with zero new provider
    // calls.
    let resubmitted = core
        .submit("client-1", message("e1"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(resubmitted, outcome);
    assert_eq!(a.calls.load(Ordering::SeqCst), 3);
    assert_eq!(b.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_breaker_skips_provider_until_cooldown() {
    let mut config = test_config();
    config.breaker.cooldown_ms = 80;

    let a = Arc::new(FailingTransport::default());
    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(
        config,
        vec![("provider-a", a.clone()), ("provider-b", b.clone())],
    );
    let _shutdown = spawn_consumer(&core);

    // First dispatch trips A's breaker (threshold 3 == attempt budget)
    core.submit("client-1", message("m1")).outcome().await.unwrap();
    assert_eq!(a.calls.load(Ordering::SeqCst), 3);

    let stats = core.provider_stats();
    assert_eq!(stats[0].name, "provider-a");
    assert!(stats[0].breaker.is_open);

    // Within the cooldown, A is skipped entirely: no new calls to it
    let second = core
        .submit("client-1", message("m2"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(
        second,
        DispatchOutcome::Sent {
            provider: "provider-b".to_string(),
            attempts: 1
        }
    );
    assert_eq!(a.calls.load(Ordering::SeqCst), 3);

    // After the cooldown, the next dispatch probes A again
    tokio::time::sleep(Duration::from_millis(100)).await;
    core.submit("client-1", message("m3")).outcome().await.unwrap();
    assert_eq!(a.calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_rate_limit_rejects_sixth_submission() {
    // 6 distinct ids from one client key within one window, limit 5:
    // the first 5 are processed, the 6th is RateLimited and never
    // enqueued or dispatched.
    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(test_config(), vec![("provider-b", b.clone())]);
    let _shutdown = spawn_consumer(&core);

    let handles: Vec<_> = (1..=6)
        .map(|n| core.submit("client-1", message(&format!("m{n}"))))
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.outcome().await.unwrap());
    }

    for outcome in &outcomes[..5] {
        assert!(outcome.is_sent());
    }
    assert_eq!(outcomes[5], DispatchOutcome::RateLimited);
    assert_eq!(b.calls.load(Ordering::SeqCst), 5);

    // The rejected id was never dispatched or recorded
    assert!(core.lookup("m6").is_none());
}

#[tokio::test]
async fn test_rate_limit_window_elapses() {
    let mut config = test_config();
    config.rate_limit.limit = 2;
    config.rate_limit.window_ms = 60;

    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(config, vec![("provider-b", b.clone())]);
    let _shutdown = spawn_consumer(&core);

    assert!(core
        .submit("client-1", message("m1"))
        .outcome()
        .await
        .unwrap()
        .is_sent());
    assert!(core
        .submit("client-1", message("m2"))
        .outcome()
        .await
        .unwrap()
        .is_sent());
    assert_eq!(
        core.submit("client-1", message("m3"))
            .outcome()
            .await
            .unwrap(),
        DispatchOutcome::RateLimited
    );

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(core
        .submit("client-1", message("m4"))
        .outcome()
        .await
        .unwrap()
        .is_sent());
}

#[tokio::test]
async fn test_fifo_ordering_without_interleaving() {
    let recording = Arc::new(RecordingTransport::default());
    let core = build_core(test_config(), vec![("provider-a", recording.clone())]);
    let _shutdown = spawn_consumer(&core);

    let h1 = core.submit("client-1", message("m1"));
    let h2 = core.submit("client-1", message("m2"));
    let h3 = core.submit("client-1", message("m3"));

    assert!(h1.outcome().await.unwrap().is_sent());
    assert!(h2.outcome().await.unwrap().is_sent());
    assert!(h3.outcome().await.unwrap().is_sent());

    // Strict submission order, and each dispatch completes before the
    // next starts.
    let events = recording.events.lock().clone();
    assert_eq!(
        events,
        vec![
            "start:m1", "end:m1", "start:m2", "end:m2", "start:m3", "end:m3"
        ]
    );
}

#[tokio::test]
async fn test_racing_duplicates_linearize() {
    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(test_config(), vec![("provider-b", b.clone())]);

    // Submit the same id twice before any consumer runs, so both pass the
    // submission-time ledger check and are enqueued.
    let first = core.submit("client-1", message("dup"));
    let second = core.submit("client-2", message("dup"));

    let _shutdown = spawn_consumer(&core);

    let first = first.outcome().await.unwrap();
    let second = second.outcome().await.unwrap();

    // The winner drove the single dispatch; the loser observed the
    // recorded outcome without provider contact.
    assert_eq!(first, second);
    assert_eq!(b.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_outcome_is_terminal() {
    let a = Arc::new(FailingTransport::default());
    let core = build_core(test_config(), vec![("provider-a", a.clone())]);
    let _shutdown = spawn_consumer(&core);

    let outcome = core
        .submit("client-1", message("m1"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Failed { attempts: 3 });

    // Resubmission with the same id returns the recorded failure, it does
    // not re-attempt.
    let resubmitted = core
        .submit("client-1", message("m1"))
        .outcome()
        .await
        .unwrap();
    assert_eq!(resubmitted, outcome);
    assert_eq!(a.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_query_service_surface() {
    let b = Arc::new(SucceedingTransport::default());
    let core = build_core(test_config(), vec![("provider-b", b.clone())]);
    let _shutdown = spawn_consumer(&core);

    assert!(core.lookup("m1").is_none());
    assert!(core.rate_limit_stats("client-1").is_none());

    core.submit("client-1", message("m1")).outcome().await.unwrap();

    let service: &dyn DispatchQueryService = core.as_ref();
    assert!(service.lookup("m1").is_some());
    assert_eq!(service.queue_len(), 0);

    let rate = service.rate_limit_stats("client-1").unwrap();
    assert_eq!(rate.current, 1);

    let providers = service.provider_stats();
    assert_eq!(providers.len(), 1);
    assert!(!providers[0].breaker.is_open);
}

#[tokio::test]
async fn test_shutdown_completes_in_flight_item() {
    let recording = Arc::new(RecordingTransport::default());
    let core = build_core(test_config(), vec![("provider-a", recording.clone())]);
    let shutdown = spawn_consumer(&core);

    let handle = core.submit("client-1", message("m1"));

    // Let the consumer pick the item up, then signal shutdown mid-flight
    tokio::time::sleep(Duration::from_millis(3)).await;
    shutdown.send(Signal::Shutdown).unwrap();

    // The in-flight dispatch runs to completion and is recorded
    assert!(handle.outcome().await.unwrap().is_sent());
    assert!(core.lookup("m1").is_some());
}
