use super::types::{CircuitBreakerStats, CircuitState};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;

/// Number of response-time samples kept for the rolling average
pub const RESPONSE_TIME_SAMPLES: usize = 100;

/// Rolling statistics owned by a single breaker
#[derive(Debug, Clone, Default)]
pub(crate) struct RollingStats {
    pub failures: u64,
    pub successes: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    response_times: VecDeque<Duration>,
    average_response_time: Duration,
}

impl RollingStats {
    pub fn record_request(&mut self) {
        self.total_requests += 1;
    }

    pub fn record_success(&mut self, duration: Duration) {
        self.successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.last_success_time = Some(Utc::now());
        self.record_response_time(duration);
    }

    pub fn record_failure(&mut self, duration: Duration) {
        self.failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_failure_time = Some(Utc::now());
        self.record_response_time(duration);
    }

    /// Zero the streak counters, keeping cumulative totals
    pub fn clear_streaks(&mut self) {
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
    }

    pub fn average_response_time(&self) -> Duration {
        self.average_response_time
    }

    fn record_response_time(&mut self, duration: Duration) {
        self.response_times.push_back(duration);
        if self.response_times.len() > RESPONSE_TIME_SAMPLES {
            self.response_times.pop_front();
        }

        let total: Duration = self.response_times.iter().sum();
        self.average_response_time = total / self.response_times.len() as u32;
    }

    pub fn snapshot(&self, name: &str, state: CircuitState) -> CircuitBreakerStats {
        CircuitBreakerStats {
            name: name.to_string(),
            state,
            failures: self.failures,
            successes: self.successes,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            total_requests: self.total_requests,
            last_failure_time: self.last_failure_time,
            last_success_time: self.last_success_time,
            response_times: self.response_times.iter().copied().collect(),
            average_response_time: self.average_response_time,
        }
    }
}
