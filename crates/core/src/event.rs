//! Domain event system: decoupled observation of the engine.
//!
//! Events are published when something interesting happens (a function is
//! registered, a completion is requested, a tool runs, a conversation ends).
//! Observers subscribe without the engine knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A function was added to a catalog
    FunctionRegistered {
        function: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop asked the model for the next turn
    CompletionRequested {
        conversation_id: String,
        iteration: u32,
        streamed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool call produced its result
    ToolExecuted {
        conversation_id: String,
        function: String,
        call_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a final answer
    ConversationCompleted {
        conversation_id: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// The conversation reached the `Failed` state
    ConversationFailed {
        conversation_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
