//! Domain event system: decoupled observation of assistant runs.
//!
//! Events are published as a run progresses. Observers (CLI verbose output,
//! tests, future metrics) subscribe without coupling to the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run was accepted for a session
    RunStarted {
        session_id: String,
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// The completion backend answered
    ModelCalled {
        session_id: String,
        model: String,
        tokens_used: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A model response could not be parsed
    ParseFailed {
        session_id: String,
        reason: String,
        failures: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolInvoked {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A run ended (outcome is "final_answer", "exhausted", "parse_failure_exceeded", or "failed")
    RunFinished {
        session_id: String,
        outcome: String,
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
