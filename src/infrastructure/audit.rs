use crate::domain::event::AuditEvent;
use crate::domain::ports::EventSink;
use std::sync::Mutex;

/// Emits every audit event as a structured log line under the `audit`
/// target, so `RUST_LOG=audit=info` turns the trail on independently of the
/// rest of the engine's logging.
#[derive(Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            entity = %event.entity,
            id = %event.entity_id,
            action = ?event.action,
            actor = %event.actor,
            risk = ?event.risk,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit event"
        );
    }
}

/// Drops every event.
#[derive(Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Collects events in memory for inspection. Recording never fails, even
/// after a panic poisoned the lock.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes every event recorded so far, leaving the sink empty.
    pub fn drain(&self) -> Vec<AuditEvent> {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *events)
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }
}
