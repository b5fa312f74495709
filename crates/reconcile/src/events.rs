//! Events emitted while reconciling a resource

use crate::types::ResourceKey;
use std::fmt;

/// Event reasons
pub mod reason {
    pub const CANNOT_CONNECT: &str = "CannotConnectToProvider";
    pub const CANNOT_RESOLVE_REFERENCES: &str = "CannotResolveReferences";
    pub const CANNOT_UPDATE_STATUS: &str = "CannotUpdateStatus";
    pub const CANCELLED: &str = "ReconcileCancelled";
    pub const CREATED: &str = "CreatedExternalResource";
    pub const STATEMENT_FAILED: &str = "StatementFailed";
    pub const DELETED: &str = "DeletedExternalResource";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event_type: EventType,
    pub reason: &'static str,
    pub message: String,
}

impl Event {
    pub fn normal(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Warning,
            reason,
            message: message.into(),
        }
    }
}

/// Sink for reconciliation events
pub trait EventRecorder: Send + Sync {
    fn record(&self, key: &ResourceKey, event: Event);
}

/// Writes events to the log
pub struct LogRecorder;

impl EventRecorder for LogRecorder {
    fn record(&self, key: &ResourceKey, event: Event) {
        match event.event_type {
            EventType::Normal => log::info!("{key}: {}: {}", event.reason, event.message),
            EventType::Warning => log::warn!("{key}: {}: {}", event.reason, event.message),
        }
    }
}
