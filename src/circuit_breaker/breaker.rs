use super::stats::RollingStats;
use super::types::{CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::error::CircuitOpenError;
use crate::events::{BreakerEvent, BreakerListener};
use futures::future::BoxFuture;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker guarding a single named dependency.
///
/// Cloning is cheap and every clone shares the same state, statistics and
/// pending timer.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: RwLock<State>,
    /// Event sinks
    listeners: Vec<Arc<dyn BreakerListener>>,
}

struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Rolling statistics
    stats: RollingStats,
    /// Pending open -> half-open transition
    timer: Option<PendingTimer>,
    /// Bumped every time a timer is armed
    timer_generation: u64,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

enum Outcome {
    Success,
    Failure(String),
    Ignored,
}

impl State {
    fn clear_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_listeners(config, Vec::new())
    }

    /// Create a new circuit breaker that reports events to `listeners`
    pub fn with_listeners(
        config: CircuitBreakerConfig,
        listeners: Vec<Arc<dyn BreakerListener>>,
    ) -> Self {
        info!(
            breaker = %config.name,
            failure_threshold = config.failure_threshold,
            success_threshold = config.success_threshold,
            timeout_ms = config.timeout_ms,
            "Creating circuit breaker"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(State {
                    circuit_state: CircuitState::Closed,
                    stats: RollingStats::default(),
                    timer: None,
                    timer_generation: 0,
                }),
                listeners,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.inner.config
    }

    /// Run `operation` through the breaker.
    ///
    /// While the circuit is open the operation is not invoked and the call
    /// fails with [`CircuitOpenError`] converted into `E`. Otherwise the
    /// operation's own result is returned unchanged.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + From<CircuitOpenError> + 'static,
    {
        self.execute_with_fallback(operation, || async {
            Err::<T, E>(E::from(CircuitOpenError::new(self.name())))
        })
        .await
    }

    /// Run `operation` through the breaker, serving `fallback` while open
    pub async fn execute_with_fallback<T, E, F, Fut, G, GFut>(
        &self,
        operation: F,
        fallback: G,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        G: FnOnce() -> GFut,
        GFut: Future<Output = Result<T, E>>,
        E: Error + 'static,
    {
        if !self.admit().await {
            return fallback().await;
        }

        let started = Instant::now();
        let result = operation().await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(error) if self.inner.config.hooks.counts_as_failure(error) => {
                Outcome::Failure(error.to_string())
            }
            Err(_) => Outcome::Ignored,
        };

        let events = match outcome {
            Outcome::Success => self.inner.record_success(elapsed).await,
            Outcome::Failure(message) => self.inner.record_failure(message, elapsed).await,
            Outcome::Ignored => {
                debug!(
                    breaker = %self.name(),
                    "Error excluded from circuit health accounting"
                );
                Vec::new()
            }
        };

        let failure = result.as_ref().err().map(|e| e as &(dyn Error + 'static));
        self.inner.dispatch(&events, failure);

        result
    }

    /// Wrap `operation` so that every invocation goes through [`execute`](Self::execute)
    pub fn wrap<A, T, E, F, Fut>(
        &self,
        operation: F,
    ) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>> + Clone + Send + Sync
    where
        A: Send + 'static,
        T: Send + 'static,
        E: Error + From<CircuitOpenError> + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let breaker = self.clone();
        let operation = Arc::new(operation);

        move |args: A| -> BoxFuture<'static, Result<T, E>> {
            let breaker = breaker.clone();
            let operation = operation.clone();
            Box::pin(async move { breaker.execute(|| (*operation)(args)).await })
        }
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        self.inner.state.read().await.circuit_state
    }

    /// Whether calls currently reach the dependency
    pub async fn is_available(&self) -> bool {
        self.state().await != CircuitState::Open
    }

    /// Snapshot of the rolling statistics
    pub async fn stats(&self) -> CircuitBreakerStats {
        let state = self.inner.state.read().await;
        state.stats.snapshot(self.name(), state.circuit_state)
    }

    /// Force the circuit open, arming the half-open timer
    pub async fn open(&self) {
        info!(breaker = %self.name(), "Circuit breaker opened manually");
        self.inner.force(CircuitState::Open).await;
    }

    /// Force the circuit closed
    pub async fn close(&self) {
        info!(breaker = %self.name(), "Circuit breaker closed manually");
        self.inner.force(CircuitState::Closed).await;
    }

    /// Zero all statistics, cancel any pending timer and close the circuit
    pub async fn reset(&self) {
        let mut state = self.inner.state.write().await;
        state.clear_timer();
        state.stats = RollingStats::default();
        state.circuit_state = CircuitState::Closed;
        drop(state);

        info!(breaker = %self.name(), "Circuit breaker reset");
        self.inner.dispatch(&[BreakerEvent::Reset {}], None);
    }

    /// Count the call and decide whether it may reach the dependency
    async fn admit(&self) -> bool {
        let mut state = self.inner.state.write().await;
        state.stats.record_request();

        if state.circuit_state != CircuitState::Open {
            return true;
        }
        drop(state);

        debug!(breaker = %self.name(), "Circuit breaker open, serving fallback");
        self.inner.dispatch(&[BreakerEvent::Rejected {}], None);
        false
    }
}

impl Inner {
    async fn record_success(self: &Arc<Self>, duration: Duration) -> Vec<BreakerEvent> {
        let mut state = self.state.write().await;
        state.stats.record_success(duration);
        let mut events = vec![BreakerEvent::Success { duration }];

        if state.circuit_state == CircuitState::HalfOpen {
            debug!(
                breaker = %self.config.name,
                consecutive_successes = state.stats.consecutive_successes,
                threshold = self.config.success_threshold,
                "Half-open probe succeeded"
            );

            if state.stats.consecutive_successes >= self.config.success_threshold {
                self.transition(&mut state, CircuitState::Closed, &mut events);
            }
        }

        events
    }

    async fn record_failure(
        self: &Arc<Self>,
        error: String,
        duration: Duration,
    ) -> Vec<BreakerEvent> {
        let mut state = self.state.write().await;
        state.stats.record_failure(duration);
        let mut events = vec![BreakerEvent::Failure { error, duration }];

        match state.circuit_state {
            CircuitState::HalfOpen => {
                warn!(
                    breaker = %self.config.name,
                    "Half-open probe failed, reopening circuit"
                );
                self.transition(&mut state, CircuitState::Open, &mut events);
            }
            CircuitState::Closed => {
                debug!(
                    breaker = %self.config.name,
                    consecutive_failures = state.stats.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Call failed in closed state"
                );

                if state.stats.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut state, CircuitState::Open, &mut events);
                }
            }
            CircuitState::Open => {
                debug!(breaker = %self.config.name, "In-flight call failed after circuit opened");
            }
        }

        events
    }

    async fn force(self: &Arc<Self>, to: CircuitState) {
        let mut state = self.state.write().await;
        let mut events = Vec::new();
        self.transition(&mut state, to, &mut events);
        drop(state);

        self.dispatch(&events, None);
    }

    fn transition(
        self: &Arc<Self>,
        state: &mut State,
        to: CircuitState,
        events: &mut Vec<BreakerEvent>,
    ) {
        let from = state.circuit_state;
        if from == to {
            return;
        }

        state.clear_timer();
        state.circuit_state = to;

        match to {
            CircuitState::Open => {
                self.arm_timer(state);
                warn!(
                    breaker = %self.config.name,
                    from = %from,
                    consecutive_failures = state.stats.consecutive_failures,
                    timeout_ms = self.config.timeout_ms,
                    "Circuit breaker opening"
                );
            }
            CircuitState::Closed => {
                state.stats.clear_streaks();
                info!(breaker = %self.config.name, from = %from, "Circuit breaker closing");
            }
            CircuitState::HalfOpen => {
                info!(
                    breaker = %self.config.name,
                    "Circuit breaker transitioning to half-open"
                );
            }
        }

        events.push(BreakerEvent::StateChange { from, to });
    }

    /// Schedule the single open -> half-open transition
    fn arm_timer(self: &Arc<Self>, state: &mut State) {
        state.timer_generation += 1;
        let generation = state.timer_generation;
        let timeout = self.config.timeout();
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.write().await;

            // A timer cleared while waiting for the lock must not fire
            let current = state.timer.as_ref().map(|timer| timer.generation);
            if current != Some(generation) {
                return;
            }
            state.timer = None;

            let mut events = Vec::new();
            inner.transition(&mut state, CircuitState::HalfOpen, &mut events);
            drop(state);

            inner.dispatch(&events, None);
        });

        state.timer = Some(PendingTimer { generation, handle });
    }

    /// Run hooks and listeners for `events`, in order, outside the state lock
    fn dispatch(&self, events: &[BreakerEvent], failure: Option<&(dyn Error + 'static)>) {
        let hooks = &self.config.hooks;

        for event in events {
            match event {
                BreakerEvent::Success { duration } => {
                    if let Some(hook) = &hooks.on_success {
                        hook(*duration);
                    }
                }
                BreakerEvent::Failure { duration, .. } => {
                    if let (Some(hook), Some(error)) = (&hooks.on_failure, failure) {
                        hook(error, *duration);
                    }
                }
                BreakerEvent::StateChange { from, to } => {
                    if let Some(hook) = &hooks.on_state_change {
                        hook(*from, *to);
                    }
                }
                BreakerEvent::Rejected {} | BreakerEvent::Reset {} => {}
            }

            for listener in &self.listeners {
                listener.on_event(&self.config.name, event);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state.get_mut().clear_timer();
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.config.name)
            .field("config", &self.inner.config)
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}
