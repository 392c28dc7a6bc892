//! Status projection — a read-only mirror of coordinator state.
//!
//! The coordinator pushes after every change; observers (status sensors,
//! dashboards) watch the channels. Pushing never blocks and never fails,
//! and observers can never mutate coordinator state through it.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::prefs::PreferenceRecord;
use crate::tasks::TaskRecord;

/// Snapshot of all active tasks, keyed by entity id.
pub type TaskMap = HashMap<String, TaskRecord>;

/// Snapshot of all stored preferences, keyed by entity id.
pub type PreferenceMap = HashMap<String, PreferenceRecord>;

/// Push-updated view of the current task set and preferences.
pub struct StatusBoard {
    tasks_tx: watch::Sender<TaskMap>,
    prefs_tx: watch::Sender<PreferenceMap>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tasks_tx, _) = watch::channel(TaskMap::new());
        let (prefs_tx, _) = watch::channel(PreferenceMap::new());
        Self { tasks_tx, prefs_tx }
    }

    /// Replace the published task snapshot.
    pub fn push_tasks(&self, tasks: TaskMap) {
        self.tasks_tx.send_replace(tasks);
    }

    /// Replace the published preference snapshot.
    pub fn push_preferences(&self, prefs: PreferenceMap) {
        self.prefs_tx.send_replace(prefs);
    }

    /// Subscribe to task-set updates.
    pub fn subscribe_tasks(&self) -> watch::Receiver<TaskMap> {
        self.tasks_tx.subscribe()
    }

    /// Subscribe to preference updates.
    pub fn subscribe_preferences(&self) -> watch::Receiver<PreferenceMap> {
        self.prefs_tx.subscribe()
    }

    /// Current task snapshot.
    pub fn tasks(&self) -> TaskMap {
        self.tasks_tx.borrow().clone()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::tasks::TimeMode;

    fn record(entity_id: &str) -> TaskRecord {
        TaskRecord {
            entity_id: entity_id.into(),
            scheduled_time: "2026-08-05T12:00:00+00:00".into(),
            end_time: "2026-08-05T12:10:00+00:00".into(),
            delay_seconds: 600,
            action: Action::Off,
            original_action: None,
            notify: false,
            notify_ha: false,
            notify_mobile: false,
            notify_devices: Vec::new(),
            run_now: false,
            at_time: None,
            time_mode: TimeMode::Relative,
        }
    }

    #[tokio::test]
    async fn test_push_and_observe_tasks() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe_tasks();

        let mut tasks = TaskMap::new();
        tasks.insert("light.x".into(), record("light.x"));
        board.push_tasks(tasks);

        rx.changed().await.unwrap();
        assert!(rx.borrow().contains_key("light.x"));

        board.push_tasks(TaskMap::new());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_push_and_observe_preferences() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe_preferences();

        let mut prefs = PreferenceMap::new();
        prefs.insert("light.x".into(), PreferenceRecord::default());
        board.push_preferences(prefs);

        rx.changed().await.unwrap();
        assert!(rx.borrow().contains_key("light.x"));
    }

    #[test]
    fn test_push_without_subscribers_is_fine() {
        let board = StatusBoard::new();
        board.push_tasks(TaskMap::new());
        board.push_preferences(PreferenceMap::new());
        assert!(board.tasks().is_empty());
    }
}
