//! Observability sink for the generation core
//!
//! Components never log to a global bus. Each one receives an
//! `Arc<dyn EventSink>` at construction and emits named events with a
//! structured JSON payload; the sink decides how they are logged or stored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Named events emitted by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventName {
    #[serde(rename = "generation:started")]
    GenerationStarted,
    #[serde(rename = "generation:attempt")]
    GenerationAttempt,
    #[serde(rename = "quality:checked")]
    QualityChecked,
    #[serde(rename = "generation:success")]
    GenerationSuccess,
    #[serde(rename = "generation:failed")]
    GenerationFailed,
    #[serde(rename = "regeneration:scheduled")]
    RegenerationScheduled,
    #[serde(rename = "retry:attempt")]
    RetryAttempt,
    #[serde(rename = "fallback:triggered")]
    FallbackTriggered,
    #[serde(rename = "circuit:state_changed")]
    CircuitStateChanged,
    #[serde(rename = "circuit:rejected")]
    CircuitRejected,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::GenerationStarted => "generation:started",
            EventName::GenerationAttempt => "generation:attempt",
            EventName::QualityChecked => "quality:checked",
            EventName::GenerationSuccess => "generation:success",
            EventName::GenerationFailed => "generation:failed",
            EventName::RegenerationScheduled => "regeneration:scheduled",
            EventName::RetryAttempt => "retry:attempt",
            EventName::FallbackTriggered => "fallback:triggered",
            EventName::CircuitStateChanged => "circuit:state_changed",
            EventName::CircuitRejected => "circuit:rejected",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observability event
#[derive(Debug, Clone, Serialize)]
pub struct GenerationEvent {
    pub name: EventName,
    pub correlation_id: Option<String>,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn new(name: EventName, correlation_id: Option<&str>, payload: Value) -> Self {
        Self {
            name,
            correlation_id: correlation_id.map(str::to_string),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of observability events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GenerationEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &GenerationEvent) {}
}

/// Writes events as structured `tracing` records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &GenerationEvent) {
        let correlation_id = event.correlation_id.as_deref().unwrap_or("none");

        match event.name {
            EventName::GenerationFailed | EventName::CircuitRejected => warn!(
                event = %event.name,
                correlation_id = %correlation_id,
                payload = %event.payload,
                "Generation event"
            ),
            EventName::RetryAttempt | EventName::GenerationAttempt => debug!(
                event = %event.name,
                correlation_id = %correlation_id,
                payload = %event.payload,
                "Generation event"
            ),
            _ => info!(
                event = %event.name,
                correlation_id = %correlation_id,
                payload = %event.payload,
                "Generation event"
            ),
        }
    }
}

/// Forwards events over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<GenerationEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiving half of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &GenerationEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.sender.send(event.clone());
    }
}

/// Drain every event currently buffered in a channel sink's receiver
pub fn drain_events(receiver: &mut mpsc::UnboundedReceiver<GenerationEvent>) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
