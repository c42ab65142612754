pub mod breaker;
pub mod registry;
pub mod retry;
pub mod stats;
pub mod types;

pub use breaker::CircuitBreaker;
pub use registry::BreakerRegistry;
pub use retry::{RetryConfig, RetryExecutor};
pub use stats::RESPONSE_TIME_SAMPLES;
pub use types::{
    BreakerHooks, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, FailureHook,
    FailurePredicate, StateChangeHook, SuccessHook,
};
