//! Event Handling
//!
//! Typed publish/subscribe registries, one per notification category, so each
//! category's payload type is checked at compile time. Every subscription
//! returns a [`ListenerId`] that removes exactly that listener.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Notification categories exposed by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    PausedChanged,
    ShellLog,
    AnyCommandResponse,
    UnknownCommand,
}

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    category: EventCategory,
    id: u64,
}

impl ListenerId {
    pub fn category(&self) -> EventCategory {
        self.category
    }
}

/// Asynchronous log output from the device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShellLogEvent {
    /// Log line as rendered, trimmed
    pub text: String,
    /// When the line was classified
    pub received_at: DateTime<Utc>,
}

/// A response matched to a queued command or a durable registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    /// The command the response belongs to
    pub command: String,
    /// Response text with the command echo stripped
    pub response: String,
    /// Whether the response matched the error pattern
    pub is_error: bool,
    pub received_at: DateTime<Utc>,
}

/// Output that matched neither a command nor a log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnknownOutput {
    /// Full segment text, trimmed
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Any parser notification, for consumers that want a single stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParserEvent {
    Paused { paused: bool },
    Log(ShellLogEvent),
    Response(CommandResponse),
    Unknown(UnknownOutput),
}

type Handler<E> = Box<dyn FnMut(&E) + Send>;

/// Listeners for one event category
pub struct EventRegistry<E> {
    category: EventCategory,
    next_id: u64,
    listeners: Vec<(u64, Handler<E>)>,
}

impl<E> EventRegistry<E> {
    pub fn new(category: EventCategory) -> Self {
        Self {
            category,
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Add a listener; it is called for every subsequent [`emit`](Self::emit)
    pub fn subscribe<F>(&mut self, handler: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(handler)));
        ListenerId {
            category: self.category,
            id,
        }
    }

    /// Remove one listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, listener: ListenerId) -> bool {
        if listener.category != self.category {
            return false;
        }
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != listener.id);
        self.listeners.len() != before
    }

    /// Call every listener in subscription order
    pub fn emit(&mut self, event: &E) {
        for (_, handler) in self.listeners.iter_mut() {
            handler(event);
        }
    }

    /// Call only the given listener
    pub fn emit_to(&mut self, listener: ListenerId, event: &E) {
        if listener.category != self.category {
            return;
        }
        if let Some((_, handler)) = self.listeners.iter_mut().find(|(id, _)| *id == listener.id) {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("category", &self.category)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
