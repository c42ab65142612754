use circuit_guard::circuit_breaker::{
    BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState, RESPONSE_TIME_SAMPLES,
};
use circuit_guard::error::CircuitOpenError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, thiserror::Error)]
enum BackendError {
    #[error("backend unavailable")]
    Unavailable,
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
}

fn config(name: &str) -> CircuitBreakerConfig {
    CircuitBreakerConfig::new(name)
        .with_failure_threshold(3)
        .with_success_threshold(2)
        .with_timeout(Duration::from_millis(1000))
}

async fn fail(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<&'static str, BackendError> {
    breaker
        .execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Unavailable)
        })
        .await
}

async fn succeed(
    breaker: &CircuitBreaker,
    calls: &AtomicU32,
) -> Result<&'static str, BackendError> {
    breaker
        .execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("fresh")
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_circuit_breaker_full_cycle() {
    let breaker = CircuitBreaker::new(config("inventory"));
    let calls = AtomicU32::new(0);

    // Initially circuit should be closed
    assert_eq!(breaker.state().await, CircuitState::Closed);

    for _ in 0..3 {
        assert!(matches!(
            fail(&breaker, &calls).await,
            Err(BackendError::Unavailable)
        ));
    }
    assert_eq!(breaker.state().await, CircuitState::Open);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Open circuit answers with the fallback without reaching the backend
    let result = breaker
        .execute_with_fallback(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BackendError>("fresh")
            },
            || async { Ok("cached") },
        )
        .await;
    assert_eq!(result.unwrap(), "cached");
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // Wait for timeout to transition to half-open
    sleep(Duration::from_millis(1001)).await;
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);

    // Probe calls reach the backend
    assert_eq!(succeed(&breaker, &calls).await.unwrap(), "fresh");
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);
    assert_eq!(succeed(&breaker, &calls).await.unwrap(), "fresh");

    // Circuit should be closed again
    assert_eq!(breaker.state().await, CircuitState::Closed);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let stats = breaker.stats().await;
    assert_eq!(stats.total_requests, 6);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.successes, 2);
    assert_eq!(stats.consecutive_failures, 0);
    assert_eq!(stats.consecutive_successes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_restarts_timer() {
    let breaker = CircuitBreaker::new(config("search"));
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let _ = fail(&breaker, &calls).await;
    }
    sleep(Duration::from_millis(1001)).await;
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);

    // A single failure while probing reopens the circuit
    let _ = fail(&breaker, &calls).await;
    assert_eq!(breaker.state().await, CircuitState::Open);
    assert!(matches!(
        succeed(&breaker, &calls).await,
        Err(BackendError::Open(_))
    ));

    // The new timer runs a full timeout from the reopen
    sleep(Duration::from_millis(999)).await;
    assert_eq!(breaker.state().await, CircuitState::Open);
    sleep(Duration::from_millis(2)).await;
    assert_eq!(breaker.state().await, CircuitState::HalfOpen);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_errors_never_open_circuit() {
    let breaker = CircuitBreaker::new(config("catalog").is_failure(|e| {
        !matches!(e.downcast_ref::<BackendError>(), Some(BackendError::NotFound))
    }));

    for _ in 0..8 {
        let result: Result<(), BackendError> = breaker
            .execute(|| async { Err(BackendError::NotFound) })
            .await;
        assert!(matches!(result, Err(BackendError::NotFound)));
    }

    assert_eq!(breaker.state().await, CircuitState::Closed);
    let stats = breaker.stats().await;
    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_registry_first_registration_wins() {
    let registry = BreakerRegistry::new();

    let first = registry.get_breaker(config("payments").with_failure_threshold(1));
    let second = registry.get_breaker(config("payments").with_failure_threshold(10));

    assert_eq!(second.config().failure_threshold, 1);
    assert_eq!(registry.len(), 1);

    let calls = AtomicU32::new(0);
    let _ = fail(&first, &calls).await;
    assert_eq!(second.state().await, CircuitState::Open);
    assert_eq!(registry.open_circuits().await, vec!["payments".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_reset_behaves_like_new_breaker() {
    let breaker = CircuitBreaker::new(config("ledger"));
    let calls = AtomicU32::new(0);

    for _ in 0..3 {
        let _ = fail(&breaker, &calls).await;
    }
    assert_eq!(breaker.state().await, CircuitState::Open);

    breaker.reset().await;

    let stats = breaker.stats().await;
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.failures, 0);
    assert!(stats.last_failure_time.is_none());
    assert!(stats.response_times.is_empty());
    assert_eq!(stats.average_response_time, Duration::ZERO);

    // The cancelled timer must not move the breaker later
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(breaker.state().await, CircuitState::Closed);

    // Same threshold applies again from scratch
    let _ = fail(&breaker, &calls).await;
    let _ = fail(&breaker, &calls).await;
    assert_eq!(breaker.state().await, CircuitState::Closed);
    let _ = fail(&breaker, &calls).await;
    assert_eq!(breaker.state().await, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_average_over_most_recent_samples() {
    let breaker = CircuitBreaker::new(config("profiles"));

    // 20 slow calls followed by a full window of fast ones
    for _ in 0..20 {
        let _: Result<(), BackendError> = breaker
            .execute(|| async {
                sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;
    }
    for _ in 0..RESPONSE_TIME_SAMPLES {
        let _: Result<(), BackendError> = breaker
            .execute(|| async {
                sleep(Duration::from_millis(10)).await;
                Ok(())
            })
            .await;
    }

    let stats = breaker.stats().await;
    assert_eq!(stats.response_times.len(), RESPONSE_TIME_SAMPLES);
    assert_eq!(stats.total_requests, 120);
    assert!(stats.average_response_time >= Duration::from_millis(10));
    assert!(stats.average_response_time < Duration::from_millis(20));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_breaker() {
    let breaker = CircuitBreaker::new(config("shared").with_failure_threshold(50));
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let breaker = breaker.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..10 {
                let _ = succeed(&breaker, &calls).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = breaker.stats().await;
    assert_eq!(stats.total_requests, 100);
    assert_eq!(stats.successes, 100);
    assert_eq!(calls.load(Ordering::SeqCst), 100);
}
