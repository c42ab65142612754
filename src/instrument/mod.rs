//! Attach breakers to existing call sites.
//!
//! ```rust,ignore
//! let charge = Instrumented::for_type::<PaymentService>(&registry, "charge")
//!     .configure(|c| c.with_failure_threshold(3).is_failure(|e| !e.is::<CardDeclined>()))
//!     .wrap(move |order: Order| client.clone().charge(order));
//!
//! let receipt = charge.call(order).await?;
//! ```
//!
//! The breaker never bounds how long a call may take. Call sites that need a
//! latency bound race the operation with [`with_deadline`], which turns an
//! expired deadline into a failure the breaker counts.

use crate::circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig};
use crate::error::{CircuitOpenError, DeadlineExceeded};
use futures::future::BoxFuture;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

type OperationFn<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type FallbackFn<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Registry key for a method on an owning type, e.g. `PaymentService.charge`
pub fn breaker_name(owner: &str, method: &str) -> String {
    format!("{}.{}", owner, method)
}

/// Type name without module path or generic arguments
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Race `future` against `deadline`, failing with [`DeadlineExceeded`] on expiry
pub async fn with_deadline<T, E, Fut>(deadline: Duration, future: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<DeadlineExceeded>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(E::from(DeadlineExceeded(deadline))),
    }
}

/// Builder binding a call site to a named breaker in a registry
#[derive(Debug, Clone)]
pub struct Instrumented {
    registry: BreakerRegistry,
    config: CircuitBreakerConfig,
}

impl Instrumented {
    pub fn new(registry: &BreakerRegistry, owner: &str, method: &str) -> Self {
        Self {
            registry: registry.clone(),
            config: CircuitBreakerConfig::new(breaker_name(owner, method)),
        }
    }

    /// Derive the owner part of the name from `T`
    pub fn for_type<T: ?Sized>(registry: &BreakerRegistry, method: &str) -> Self {
        Self::new(registry, short_type_name::<T>(), method)
    }

    /// Adjust the configuration used if the breaker does not exist yet
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(CircuitBreakerConfig) -> CircuitBreakerConfig,
    {
        let name = self.config.name.clone();
        self.config = configure(self.config);
        self.config.name = name;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Get or create the breaker this call site routes through
    pub fn breaker(&self) -> CircuitBreaker {
        self.registry.get_breaker(self.config.clone())
    }

    /// Produce a guarded version of `operation`
    pub fn wrap<A, T, E, F, Fut>(self, operation: F) -> Guarded<A, T, E>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let operation: OperationFn<A, T, E> =
            Arc::new(move |args: A| -> BoxFuture<'static, Result<T, E>> { Box::pin(operation(args)) });

        Guarded {
            breaker: self.breaker(),
            operation,
            fallback: None,
        }
    }
}

/// An async function whose every invocation goes through a circuit breaker
pub struct Guarded<A, T, E> {
    breaker: CircuitBreaker,
    operation: OperationFn<A, T, E>,
    fallback: Option<FallbackFn<T, E>>,
}

impl<A, T, E> Guarded<A, T, E>
where
    E: Error + From<CircuitOpenError> + 'static,
{
    /// Serve `fallback` instead of the open-circuit error while the circuit is open
    pub fn with_fallback<G, GFut>(mut self, fallback: G) -> Self
    where
        G: Fn() -> GFut + Send + Sync + 'static,
        GFut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fallback: FallbackFn<T, E> =
            Arc::new(move || -> BoxFuture<'static, Result<T, E>> { Box::pin(fallback()) });
        self.fallback = Some(fallback);
        self
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Invoke the wrapped function through the breaker
    pub async fn call(&self, args: A) -> Result<T, E> {
        let operation = &self.operation;
        match &self.fallback {
            Some(fallback) => {
                self.breaker
                    .execute_with_fallback(|| operation(args), || fallback())
                    .await
            }
            None => self.breaker.execute(|| operation(args)).await,
        }
    }
}

impl<A, T, E> Clone for Guarded<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
            operation: self.operation.clone(),
            fallback: self.fallback.clone(),
        }
    }
}
