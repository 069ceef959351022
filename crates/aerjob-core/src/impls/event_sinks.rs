//! EventSink 実装

use std::sync::Mutex;

use tracing::info;

use crate::domain::{EventReason, JobEvent, ResourceKey};
use crate::ports::EventSink;

/// Writes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: JobEvent) {
        let reason = serde_json::to_string(&event.reason).unwrap_or_default();
        info!(target: "aerjob::events", key = %event.key, %reason, "event");
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<JobEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn reasons_for(&self, key: &ResourceKey) -> Vec<EventReason> {
        self.events()
            .into_iter()
            .filter(|event| &event.key == key)
            .map(|event| event.reason)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: JobEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
