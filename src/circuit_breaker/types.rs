use crate::error::{ResilienceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally
    Closed,
    /// Circuit is open, calls are rejected and served by the fallback
    Open,
    /// Circuit is half-open, calls probe whether the dependency recovered
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding used by the metrics listener
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Decides whether an error counts against the circuit's health
pub type FailurePredicate = Arc<dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync>;
/// Called with `(from, to)` after every state transition
pub type StateChangeHook = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;
/// Called with the call duration after every success
pub type SuccessHook = Arc<dyn Fn(Duration) + Send + Sync>;
/// Called with the error and call duration after every qualifying failure
pub type FailureHook = Arc<dyn Fn(&(dyn Error + 'static), Duration) + Send + Sync>;

/// Behavioural options supplied as code rather than configuration data.
///
/// Every hook is optional. A missing `is_failure` counts every error, the
/// other hooks default to doing nothing.
#[derive(Clone, Default)]
pub struct BreakerHooks {
    pub is_failure: Option<FailurePredicate>,
    pub on_state_change: Option<StateChangeHook>,
    pub on_success: Option<SuccessHook>,
    pub on_failure: Option<FailureHook>,
}

impl BreakerHooks {
    /// Classify an error through the configured predicate
    pub fn counts_as_failure(&self, error: &(dyn Error + 'static)) -> bool {
        self.is_failure
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }
}

impl fmt::Debug for BreakerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerHooks")
            .field("is_failure", &self.is_failure.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Unique breaker name, used as the registry key
    pub name: String,

    /// Number of consecutive qualifying failures before opening the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Number of consecutive successes in half-open state before closing
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Delay in open state before the circuit moves to half-open
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Accepted for compatibility; no transition reads it
    #[serde(default)]
    pub reset_timeout_ms: Option<u64>,

    /// Accepted for compatibility; no transition reads it
    #[serde(default)]
    pub monitor_interval_ms: Option<u64>,

    #[serde(skip)]
    pub hooks: BreakerHooks,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl CircuitBreakerConfig {
    /// Create a configuration with default thresholds
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_ms: default_timeout_ms(),
            reset_timeout_ms: None,
            monitor_interval_ms: None,
            hooks: BreakerHooks::default(),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Only errors for which `predicate` returns true count against the circuit
    pub fn is_failure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.hooks.is_failure = Some(Arc::new(predicate));
        self
    }

    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.hooks.on_state_change = Some(Arc::new(hook));
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.hooks.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&(dyn Error + 'static), Duration) + Send + Sync + 'static,
    {
        self.hooks.on_failure = Some(Arc::new(hook));
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Option<Duration> {
        self.reset_timeout_ms.map(Duration::from_millis)
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        self.monitor_interval_ms.map(Duration::from_millis)
    }

    /// Validate thresholds and naming
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ResilienceError::Config(
                "Circuit breaker name cannot be empty".to_string(),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(ResilienceError::Config(format!(
                "failure_threshold must be > 0 for breaker: {}",
                self.name
            )));
        }
        if self.success_threshold == 0 {
            return Err(ResilienceError::Config(format!(
                "success_threshold must be > 0 for breaker: {}",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ResilienceError::Config(format!(
                "timeout_ms must be > 0 for breaker: {}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Read-only snapshot of a breaker, for health checks and monitoring
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures: u64,
    pub successes: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_millis_seq")]
    pub response_times: Vec<Duration>,
    #[serde(serialize_with = "serialize_millis")]
    pub average_response_time: Duration,
}

/// Serialize a duration as fractional milliseconds
pub(crate) fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

fn serialize_millis_seq<S: Serializer>(
    durations: &[Duration],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(durations.iter().map(|d| d.as_secs_f64() * 1000.0))
}
