//! Timer lifecycle events — fire-and-forget broadcast for external observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::actions::Action;

/// Why a task was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    UserRequest,
    ManualStateChange,
    Shutdown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::UserRequest => write!(f, "user_request"),
            CancelReason::ManualStateChange => write!(f, "manual_state_change"),
            CancelReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Lifecycle events emitted by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimerEvent {
    TaskStarted {
        entity_id: String,
        action: Action,
        scheduled_time: String,
        end_time: String,
        delay_seconds: i64,
        run_now: bool,
    },
    TaskCompleted {
        entity_id: String,
        action: Action,
    },
    TaskCancelled {
        entity_id: String,
        reason: CancelReason,
    },
}

/// Broadcast bus for timer events. Emission never blocks and never fails;
/// events with no subscribers are simply dropped.
pub struct EventBus {
    tx: broadcast::Sender<TimerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Emit an event to whoever is listening.
    pub fn emit(&self, event: TimerEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
