//! Circuit breakers for async calls to unreliable dependencies.
//!
//! A [`CircuitBreaker`] watches the outcome of every call it guards. After
//! enough consecutive failures it opens and answers with a fallback instead of
//! calling the dependency; once its timeout elapses it lets probe calls through
//! and closes again after enough consecutive successes.
//!
//! Breakers are usually obtained from a [`BreakerRegistry`] by name, either
//! directly or through an [`Instrumented`] call site.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod instrument;
pub mod metrics;
pub mod observability;

pub use circuit_breaker::{
    BreakerHooks, BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats,
    CircuitState, RetryConfig, RetryExecutor,
};
pub use config::ResilienceConfig;
pub use error::{CircuitOpenError, DeadlineExceeded, ResilienceError, Result};
pub use events::{BreakerEvent, BreakerListener, ChannelListener};
pub use instrument::{breaker_name, with_deadline, Guarded, Instrumented};
pub use metrics::MetricsListener;
pub use observability::init_tracing;
