//! Engine events for observability.
//!
//! Events are broadcast on a tokio channel. Subscribers are optional;
//! publishing to a bus nobody listens to is not an error.

use crate::block::BlockKind;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the engine as a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The classifier opened a new block.
    BlockOpened {
        kind: BlockKind,
        tool_name: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The classifier closed a block.
    BlockClosed {
        kind: BlockKind,
        complete: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool invocation finished.
    ToolDispatched {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One loop iteration finished.
    IterationFinished {
        session_id: String,
        index: u32,
        timestamp: DateTime<Utc>,
    },

    /// A run reached `Completed`.
    RunCompleted {
        session_id: String,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// A run reached `Error`.
    RunFailed {
        session_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    pub fn run_completed(session_id: &SessionId, degraded: bool) -> Self {
        Self::RunCompleted {
            session_id: session_id.to_string(),
            degraded,
            timestamp: Utc::now(),
        }
    }

    pub fn run_failed(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::RunFailed {
            session_id: session_id.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A broadcast bus for engine events.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Lagging or absent subscribers are ignored.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
