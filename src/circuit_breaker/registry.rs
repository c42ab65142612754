use super::breaker::CircuitBreaker;
use super::types::{CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::config::ResilienceConfig;
use crate::error::Result;
use crate::events::BreakerListener;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Name-keyed collection of circuit breakers.
///
/// Construct one at the application root and hand out clones; every clone
/// shares the same map. A name is bound to the first configuration
/// registered under it.
#[derive(Clone, Default)]
pub struct BreakerRegistry {
    /// Circuit breakers per dependency name
    breakers: Arc<DashMap<String, CircuitBreaker>>,
    /// Listeners attached to every breaker this registry creates
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl BreakerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `listener` to every breaker created from now on
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Create a registry pre-populated from a configuration file
    pub fn from_config(config: &ResilienceConfig) -> Result<Self> {
        Self::new().register_all(config)
    }

    /// Validate `config` and register every breaker it declares
    pub fn register_all(self, config: &ResilienceConfig) -> Result<Self> {
        config.validate()?;
        for breaker in &config.breakers {
            self.get_breaker(breaker.clone());
        }
        Ok(self)
    }

    /// Get the breaker registered under `config.name`, creating it if absent.
    ///
    /// An existing breaker is returned unchanged even when `config` differs.
    pub fn get_breaker(&self, config: CircuitBreakerConfig) -> CircuitBreaker {
        if let Some(existing) = self.breakers.get(&config.name) {
            return existing.clone();
        }

        self.breakers
            .entry(config.name.clone())
            .or_insert_with(|| {
                debug!(breaker = %config.name, "Registering circuit breaker");
                CircuitBreaker::with_listeners(config, self.listeners.clone())
            })
            .clone()
    }

    /// Look up a breaker without creating it
    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// Get all registered breaker names
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot statistics of every registered breaker, sorted by name
    pub async fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats = Vec::with_capacity(self.breakers.len());
        for breaker in self.snapshot() {
            stats.push(breaker.stats().await);
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Names of breakers whose circuit is currently open
    pub async fn open_circuits(&self) -> Vec<String> {
        let mut open = Vec::new();
        for breaker in self.snapshot() {
            if breaker.state().await == CircuitState::Open {
                open.push(breaker.name().to_string());
            }
        }
        open.sort();
        open
    }

    /// Reset every registered breaker
    pub async fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset().await;
        }
    }

    /// Clone the handles out so no map shard is held across an await
    fn snapshot(&self) -> Vec<CircuitBreaker> {
        self.breakers.iter().map(|e| e.value().clone()).collect()
    }
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
