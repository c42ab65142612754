use crate::error::{ResilienceError, Result};
use crate::events::{BreakerEvent, BreakerListener};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Install the Prometheus recorder and register metric descriptions.
///
/// The returned handle renders the exposition text for whatever endpoint the
/// application serves metrics from.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        ResilienceError::Internal(format!("Failed to install metrics recorder: {}", e))
    })?;

    describe_metrics();
    info!("Metrics recorder installed");

    Ok(handle)
}

/// Register all breaker metrics with descriptions
pub fn describe_metrics() {
    describe_counter!(
        "circuit_breaker_calls_total",
        "Calls that reached the protected dependency, by outcome"
    );
    describe_histogram!(
        "circuit_breaker_call_duration_seconds",
        "Latency of calls that reached the protected dependency"
    );
    describe_gauge!(
        "circuit_breaker_state",
        "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
    );
    describe_counter!(
        "circuit_breaker_transitions_total",
        "Total number of circuit breaker state transitions"
    );
    describe_counter!(
        "circuit_breaker_rejections_total",
        "Calls rejected because the circuit was open"
    );
    describe_counter!(
        "circuit_breaker_resets_total",
        "Number of times a circuit breaker was reset"
    );

    debug!("Circuit breaker metrics registered with descriptions");
}

/// Records breaker events through the `metrics` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsListener;

impl MetricsListener {
    pub fn new() -> Self {
        Self
    }
}

impl BreakerListener for MetricsListener {
    fn on_event(&self, breaker: &str, event: &BreakerEvent) {
        match event {
            BreakerEvent::Success { duration } => record_call(breaker, "success", *duration),
            BreakerEvent::Failure { duration, .. } => record_call(breaker, "failure", *duration),
            BreakerEvent::StateChange { from, to } => {
                let labels = [("breaker", breaker.to_string())];
                gauge!("circuit_breaker_state", &labels).set(to.as_gauge());

                let labels = [
                    ("breaker", breaker.to_string()),
                    ("from", from.to_string()),
                    ("to", to.to_string()),
                ];
                counter!("circuit_breaker_transitions_total", &labels).increment(1);
            }
            BreakerEvent::Rejected {} => {
                let labels = [("breaker", breaker.to_string())];
                counter!("circuit_breaker_rejections_total", &labels).increment(1);
            }
            BreakerEvent::Reset {} => {
                let labels = [("breaker", breaker.to_string())];
                counter!("circuit_breaker_resets_total", &labels).increment(1);
                gauge!("circuit_breaker_state", &labels).set(0.0);
            }
        }
    }
}

fn record_call(breaker: &str, outcome: &'static str, duration: Duration) {
    let labels = [
        ("breaker", breaker.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!("circuit_breaker_calls_total", &labels).increment(1);
    histogram!("circuit_breaker_call_duration_seconds", &labels).record(duration.as_secs_f64());
}
