//! Events reported against declarations

use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Normal => write!(f, "Normal"),
            EventType::Warning => write!(f, "Warning"),
        }
    }
}

/// An event about one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name of the declaration the event is about
    pub object: String,
    pub type_: EventType,
    pub reason: String,
    pub message: String,
}

impl Event {
    pub fn normal(object: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            object: object.to_string(),
            type_: EventType::Normal,
            reason: reason.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(object: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            object: object.to_string(),
            type_: EventType::Warning,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Renders as `<type> <reason> <message>`
impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.type_, self.reason, self.message)
    }
}

/// Sink for declaration events
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: Event);
}

impl<T: EventRecorder + ?Sized> EventRecorder for Arc<T> {
    fn record(&self, event: Event) {
        (**self).record(event)
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventRecorder for TracingEvents {
    fn record(&self, event: Event) {
        match event.type_ {
            EventType::Normal => tracing::info!(
                trustroot = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                trustroot = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events rendered as `<type> <reason> <message>`
    pub fn rendered(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventRecorder for RecordingEvents {
    fn record(&self, event: Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
