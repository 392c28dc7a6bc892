//! Entity state-change bus and the auto-cancel policy.
//!
//! The host feeds observed entity transitions into the bus; the
//! coordinator keeps one filtered listener per scheduled key and cancels
//! a pending task when a manual change makes its action redundant.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::actions::Action;

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";

/// An observed entity state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: String,
    pub old_state: String,
    pub new_state: String,
}

/// Broadcast bus of entity state changes.
pub struct StateBus {
    tx: broadcast::Sender<StateChange>,
}

impl StateBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(128);
        Self { tx }
    }

    /// Publish a transition. No subscribers is not an error.
    pub fn publish(&self, change: StateChange) {
        let _ = self.tx.send(change);
    }

    /// Subscribe to all transitions (callers filter by entity).
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a manual transition makes the scheduled action redundant.
///
/// A pending `on` is redundant once the entity is on, a pending `off`
/// once it is off, and a pending `toggle` after any manual change.
pub fn should_auto_cancel(scheduled: Action, old_state: &str, new_state: &str) -> bool {
    match scheduled {
        Action::On => new_state == STATE_ON,
        Action::Off => new_state == STATE_OFF,
        Action::Toggle => new_state != old_state,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_redundant_when_turned_on() {
        assert!(should_auto_cancel(Action::On, STATE_OFF, STATE_ON));
        assert!(!should_auto_cancel(Action::On, STATE_ON, STATE_OFF));
    }

    #[test]
    fn test_off_redundant_when_turned_off() {
        assert!(should_auto_cancel(Action::Off, STATE_ON, STATE_OFF));
        assert!(!should_auto_cancel(Action::Off, STATE_OFF, STATE_ON));
    }

    #[test]
    fn test_toggle_preempted_by_any_change() {
        assert!(should_auto_cancel(Action::Toggle, STATE_ON, STATE_OFF));
        assert!(should_auto_cancel(Action::Toggle, "playing", "paused"));
        assert!(!should_auto_cancel(Action::Toggle, STATE_ON, STATE_ON));
    }

    #[test]
    fn test_other_actions_never_auto_cancel() {
        assert!(!should_auto_cancel(Action::CloseCover, "open", "closed"));
        assert!(!should_auto_cancel(Action::MediaStop, "playing", "idle"));
    }

    #[tokio::test]
    async fn test_bus_delivery() {
        let bus = StateBus::new();
        let mut rx = bus.subscribe();
        bus.publish(StateChange {
            entity_id: "light.x".into(),
            old_state: STATE_OFF.into(),
            new_state: STATE_ON.into(),
        });
        let change = rx.recv().await.unwrap();
        assert_eq!(change.entity_id, "light.x");
        assert_eq!(change.new_state, STATE_ON);
    }
}
