use std::time::Duration;
use thiserror::Error;

/// Result type for resilience operations
pub type Result<T> = std::result::Result<T, ResilienceError>;

/// Returned by the default fallback when a call hits an open circuit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circuit breaker '{name}' is open")]
pub struct CircuitOpenError {
    pub name: String,
}

impl CircuitOpenError {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Produced by `with_deadline` when the raced operation does not settle in time
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation did not complete within {0:?}")]
pub struct DeadlineExceeded(pub Duration);

/// Resilience error types
#[derive(Error, Debug)]
pub enum ResilienceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ResilienceError {
    /// Whether this error is an open-circuit rejection
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResilienceError::from(CircuitOpenError::new("stripe"));
        assert_eq!(err.to_string(), "Circuit breaker 'stripe' is open");
        assert!(err.is_circuit_open());

        let err = ResilienceError::Config("bad threshold".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad threshold");
        assert!(!err.is_circuit_open());
    }

    #[test]
    fn test_deadline_display() {
        let err = DeadlineExceeded(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Operation did not complete within 250ms");
    }
}
