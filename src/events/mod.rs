//! Breaker event stream.
//!
//! Every breaker reports what happens to it as a [`BreakerEvent`] delivered to
//! its listeners, after the breaker's own lock has been released. Consumers
//! that log or alert on these events rely on the event names returned by
//! [`BreakerEvent::kind`] and on the serialized payload shapes.

use crate::circuit_breaker::types::{serialize_millis, CircuitState};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something observable that happened to a breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BreakerEvent {
    Success {
        #[serde(serialize_with = "serialize_millis")]
        duration: Duration,
    },
    Failure {
        error: String,
        #[serde(serialize_with = "serialize_millis")]
        duration: Duration,
    },
    StateChange {
        from: CircuitState,
        to: CircuitState,
    },
    Rejected {},
    Reset {},
}

impl BreakerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::Success { .. } => "success",
            BreakerEvent::Failure { .. } => "failure",
            BreakerEvent::StateChange { .. } => "stateChange",
            BreakerEvent::Rejected {} => "rejected",
            BreakerEvent::Reset {} => "reset",
        }
    }
}

/// Receives events from one or more breakers
pub trait BreakerListener: Send + Sync {
    fn on_event(&self, breaker: &str, event: &BreakerEvent);
}

impl<F> BreakerListener for F
where
    F: Fn(&str, &BreakerEvent) + Send + Sync,
{
    fn on_event(&self, breaker: &str, event: &BreakerEvent) {
        self(breaker, event)
    }
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<(String, BreakerEvent)>,
}

impl ChannelListener {
    /// Create a listener and the receiving half of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, BreakerEvent)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl BreakerListener for ChannelListener {
    fn on_event(&self, breaker: &str, event: &BreakerEvent) {
        // A dropped receiver just means nobody is watching any more
        let _ = self.sender.send((breaker.to_string(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kinds() {
        assert_eq!(
            BreakerEvent::Success {
                duration: Duration::ZERO
            }
            .kind(),
            "success"
        );
        assert_eq!(
            BreakerEvent::StateChange {
                from: CircuitState::Closed,
                to: CircuitState::Open
            }
            .kind(),
            "stateChange"
        );
        assert_eq!(BreakerEvent::Rejected {}.kind(), "rejected");
        assert_eq!(BreakerEvent::Reset {}.kind(), "reset");
    }

    #[test]
    fn test_event_payload_shapes() {
        let failure = BreakerEvent::Failure {
            error: "timeout".to_string(),
            duration: Duration::from_millis(12),
        };
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"event": "failure", "error": "timeout", "duration": 12.0})
        );

        let change = BreakerEvent::StateChange {
            from: CircuitState::HalfOpen,
            to: CircuitState::Closed,
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            json!({"event": "stateChange", "from": "HalfOpen", "to": "Closed"})
        );

        assert_eq!(
            serde_json::to_value(BreakerEvent::Rejected {}).unwrap(),
            json!({"event": "rejected"})
        );
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_events() {
        let (listener, mut receiver) = ChannelListener::new();
        listener.on_event("mailer", &BreakerEvent::Reset {});

        let (name, event) = receiver.recv().await.unwrap();
        assert_eq!(name, "mailer");
        assert_eq!(event, BreakerEvent::Reset {});
    }

    #[test]
    fn test_channel_listener_tolerates_dropped_receiver() {
        let (listener, receiver) = ChannelListener::new();
        drop(receiver);
        listener.on_event("mailer", &BreakerEvent::Rejected {});
    }

    #[test]
    fn test_closure_listener() {
        let seen = std::sync::Mutex::new(Vec::new());
        let listener = |name: &str, event: &BreakerEvent| {
            seen.lock().unwrap().push(format!("{}:{}", name, event.kind()));
        };
        listener.on_event("sms", &BreakerEvent::Rejected {});
        assert_eq!(seen.lock().unwrap().as_slice(), ["sms:rejected"]);
    }
}
