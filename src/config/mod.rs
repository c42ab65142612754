use crate::circuit_breaker::{CircuitBreakerConfig, RetryConfig};
use crate::error::{ResilienceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Resilience configuration for an application's downstream dependencies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Named breaker definitions
    #[serde(default)]
    pub breakers: Vec<CircuitBreakerConfig>,
    /// Retry policy layered over breakers
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ResilienceConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResilienceError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ResilienceError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Find the definition for a named breaker
    pub fn breaker(&self, name: &str) -> Option<&CircuitBreakerConfig> {
        self.breakers.iter().find(|b| b.name == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for breaker in &self.breakers {
            breaker.validate()?;

            if !seen.insert(breaker.name.as_str()) {
                return Err(ResilienceError::Config(format!(
                    "Duplicate circuit breaker name: {}",
                    breaker.name
                )));
            }
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(ResilienceError::Config(
                "Retry backoff multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ResilienceError::Config(
                "Retry initial backoff cannot exceed max backoff".to_string(),
            ));
        }

        Ok(())
    }
}
