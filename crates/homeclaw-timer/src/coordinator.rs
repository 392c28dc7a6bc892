//! The scheduling coordinator — owns one timer and one state listener
//! per active task key, races scheduled execution against manual state
//! changes and explicit cancels, and persists enough to resume after a
//! restart.
//!
//! Everything runs on the tokio runtime; every await is a point where a
//! competing trigger (timer fire, auto-cancel, user cancel) may
//! interleave. Correctness comes from cancel/cleanup being idempotent
//! with "entry absent" as the base case, not from locking around whole
//! operations.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use homeclaw_core::Result;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use crate::actions::Action;
use crate::events::{CancelReason, EventBus, TimerEvent};
use crate::notify::{Notification, Notifier, NotifyRoute};
use crate::prefs::{HistoryEntry, PreferenceRecord, PreferenceStore};
use crate::projection::{PreferenceMap, StatusBoard, TaskMap};
use crate::service::RunActionRequest;
use crate::state::{StateBus, should_auto_cancel};
use crate::store::TaskStore;
use crate::tasks::{TaskRecord, TimeMode, format_delay, resolve_schedule};
use crate::executor::ActionExecutor;

/// Process-local handles for one active task. Meaningless across
/// restarts, so never persisted.
struct TaskHandles {
    timer: JoinHandle<()>,
    listener: Option<JoinHandle<()>>,
}

struct Inner {
    store: Mutex<TaskStore>,
    prefs: Mutex<PreferenceStore>,
    handles: Mutex<HashMap<String, TaskHandles>>,
    executor: Arc<dyn ActionExecutor>,
    notifier: Arc<dyn Notifier>,
    state_bus: Arc<StateBus>,
    events: EventBus,
    board: StatusBoard,
}

/// The coordinator. Cheap to clone; timer and listener tasks hold
/// clones to call back into it.
#[derive(Clone)]
pub struct TimerCoordinator {
    inner: Arc<Inner>,
}

impl TimerCoordinator {
    pub fn new(
        store: TaskStore,
        prefs: PreferenceStore,
        executor: Arc<dyn ActionExecutor>,
        notifier: Arc<dyn Notifier>,
        state_bus: Arc<StateBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                prefs: Mutex::new(prefs),
                handles: Mutex::new(HashMap::new()),
                executor,
                notifier,
                state_bus,
                events: EventBus::new(),
                board: StatusBoard::new(),
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.inner.events.subscribe()
    }

    /// Subscribe to the read-only task-set projection.
    pub fn subscribe_status(&self) -> watch::Receiver<TaskMap> {
        self.inner.board.subscribe_tasks()
    }

    /// Subscribe to the read-only preference projection.
    pub fn subscribe_preference_status(&self) -> watch::Receiver<PreferenceMap> {
        self.inner.board.subscribe_preferences()
    }

    /// Current task set.
    pub async fn get_all_tasks(&self) -> TaskMap {
        self.inner.store.lock().await.get_all_tasks()
    }

    /// One task, if scheduled.
    pub async fn get_task(&self, entity_id: &str) -> Option<TaskRecord> {
        self.inner.store.lock().await.get_task(entity_id).cloned()
    }

    /// Preferences for one entity.
    pub async fn get_preferences(&self, entity_id: &str) -> Option<PreferenceRecord> {
        self.inner.prefs.lock().await.get_preferences(entity_id)
    }

    /// The full preference map.
    pub async fn get_all_preferences(&self) -> HashMap<String, PreferenceRecord> {
        self.inner.prefs.lock().await.get_all_preferences()
    }

    /// Merge-update preferences for an entity.
    pub async fn set_preferences(
        &self,
        entity_id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.inner.prefs.lock().await.set_preferences(entity_id, fields).await?;
        self.push_preference_status().await;
        Ok(())
    }

    /// Schedule a one-shot action. Any existing task for the same
    /// entity is silently replaced. After this returns Ok, exactly one
    /// timer is armed for the key (or, for run_now, the immediate leg
    /// has already executed) and the store holds exactly one record.
    pub async fn run_action(&self, request: RunActionRequest) -> Result<()> {
        request.validate()?;

        // Resolve the fire time before touching any state, so a
        // malformed time string aborts with nothing changed.
        let now = Local::now();
        let resolved = resolve_schedule(now, &request.time_spec())?;

        self.cancel_with(&request.entity_id, true, CancelReason::UserRequest).await;

        let requested = request.action;
        let mut effective = requested;
        let mut original_action = None;
        if request.run_now {
            original_action = Some(requested);
            effective = requested.reverse();
            // Immediate leg: failures are reported but don't stop the
            // reverse from being scheduled.
            if let Err(e) = self.inner.executor.execute(&request.entity_id, requested).await {
                tracing::error!("❌ run_now action {} for {} failed: {e}", requested, request.entity_id);
            }
        }

        let record = TaskRecord {
            entity_id: request.entity_id.clone(),
            scheduled_time: now.to_rfc3339(),
            end_time: resolved.end_time.to_rfc3339(),
            delay_seconds: resolved.delay_seconds,
            action: effective,
            original_action,
            notify: request.notify,
            notify_ha: request.notify_ha,
            notify_mobile: request.notify_mobile,
            notify_devices: request.notify_devices.clone(),
            run_now: request.run_now,
            at_time: request.at_time.clone(),
            time_mode: request.time_mode,
        };
        self.inner.store.lock().await.add_task(record.clone()).await?;

        // Preference writes never gate scheduling.
        if let Err(e) = self.remember(&request, now.to_rfc3339()).await {
            tracing::warn!("⚠️ Failed to persist preferences for {}: {e}", request.entity_id);
        }
        self.push_preference_status().await;

        let route = request.route();
        self.arm(&record.entity_id, resolved.end_time, effective, route.clone(), !request.run_now)
            .await;

        self.inner.events.emit(TimerEvent::TaskStarted {
            entity_id: record.entity_id.clone(),
            action: effective,
            scheduled_time: record.scheduled_time.clone(),
            end_time: record.end_time.clone(),
            delay_seconds: record.delay_seconds,
            run_now: record.run_now,
        });
        self.push_status().await;

        if !route.is_empty() {
            let when = match (&request.time_mode, &request.at_time) {
                (TimeMode::Absolute, Some(at)) => format!("at {at}"),
                _ => format!("in {}", format_delay(request.delay, request.unit)),
            };
            let upper = requested.name().to_uppercase();
            let notification = if request.run_now {
                Notification::new(
                    format!("Started: {upper} for {}", request.entity_id),
                    format!("Will automatically reverse {when}"),
                    request.entity_id.clone(),
                )
            } else {
                Notification::new(
                    format!("Scheduled: {upper} for {}", request.entity_id),
                    format!("Will execute at {}", resolved.end_time.format("%H:%M:%S")),
                    request.entity_id.clone(),
                )
            };
            self.inner.notifier.notify(notification, &route).await;
        }

        tracing::info!(
            "⏱️ Scheduled {} for {} at {} (in {}s, run_now={})",
            effective,
            request.entity_id,
            record.end_time,
            record.delay_seconds,
            record.run_now,
        );
        Ok(())
    }

    /// Cancel a scheduled task. Returns false when nothing was
    /// scheduled — including on the second of two concurrent cancels.
    pub async fn cancel_action(&self, entity_id: &str) -> bool {
        self.cancel_with(entity_id, false, CancelReason::UserRequest).await
    }

    /// Cancel every active task (silent). Used by a host tearing the
    /// integration down; records are removed, so nothing replays later.
    pub async fn cancel_all(&self) -> usize {
        let keys: Vec<String> = {
            let handles = self.inner.handles.lock().await;
            let store = self.inner.store.lock().await;
            handles
                .keys()
                .cloned()
                .chain(store.get_all_tasks().into_keys())
                .collect()
        };
        let mut cancelled = 0;
        for key in keys {
            if self.cancel_with(&key, true, CancelReason::Shutdown).await {
                cancelled += 1;
            }
        }
        cancelled
    }

    async fn cancel_with(&self, entity_id: &str, silent: bool, reason: CancelReason) -> bool {
        let has_handle = self.inner.handles.lock().await.contains_key(entity_id);
        let task = self.inner.store.lock().await.get_task(entity_id).cloned();
        if !has_handle && task.is_none() {
            if !silent {
                tracing::debug!("No scheduled task found for {entity_id}");
            }
            return false;
        }

        self.detach(entity_id, true, true).await;
        self.remove_record(entity_id).await;
        self.push_status().await;

        self.inner.events.emit(TimerEvent::TaskCancelled {
            entity_id: entity_id.to_string(),
            reason,
        });

        let wants_notice = task.as_ref().map(|t| t.notify).unwrap_or(false);
        if !silent && wants_notice {
            let route = NotifyRoute { ha: true, mobile: false, devices: Vec::new() };
            let notification = if reason == CancelReason::ManualStateChange {
                Notification::new(
                    format!("Auto-cancelled: {entity_id}"),
                    "Scheduled action was cancelled because state was changed manually",
                    entity_id,
                )
            } else {
                Notification::new(
                    format!("Cancelled: {entity_id}"),
                    "Scheduled action was cancelled",
                    entity_id,
                )
            };
            self.inner.notifier.notify(notification, &route).await;
        }

        tracing::info!("🚫 Cancelled scheduled action for {entity_id} (reason: {reason})");
        true
    }

    /// Re-arm every persisted task after a restart. Overdue tasks are
    /// executed immediately rather than dropped; unreadable records are
    /// deleted with a warning.
    pub async fn restore_tasks(&self) {
        let tasks = self.inner.store.lock().await.get_all_tasks();
        let now = Local::now();

        for (entity_id, record) in tasks {
            let Some(end_time) = record.parse_end_time() else {
                tracing::warn!("⚠️ Invalid scheduled time for {entity_id}, removing task");
                self.remove_record(&entity_id).await;
                continue;
            };

            let route = NotifyRoute {
                ha: record.notify_ha,
                mobile: record.notify_mobile,
                devices: record.notify_devices.clone(),
            };

            if end_time <= now {
                tracing::info!(
                    "⏰ Executing missed task for {entity_id} (was scheduled for {})",
                    record.end_time
                );
                self.fire(entity_id, record.action, route).await;
            } else {
                tracing::info!("♻️ Restoring scheduled task for {entity_id} at {}", record.end_time);
                self.arm(&entity_id, end_time, record.action, route, !record.run_now).await;
            }
        }
        self.push_status().await;
    }

    /// Arm the one-shot timer (and optionally the state listener) for a
    /// key, replacing any handles already present.
    async fn arm(
        &self,
        entity_id: &str,
        end_time: chrono::DateTime<Local>,
        action: Action,
        route: NotifyRoute,
        with_listener: bool,
    ) {
        let remaining = (end_time - Local::now()).to_std().unwrap_or_default();
        let coordinator = self.clone();
        let key = entity_id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            tracing::info!("🔔 Executing scheduled action {} for {}", action, key);
            coordinator.fire(key, action, route).await;
        });

        let listener = if with_listener {
            Some(self.spawn_listener(entity_id, action))
        } else {
            None
        };

        let mut handles = self.inner.handles.lock().await;
        if let Some(old) = handles.insert(entity_id.to_string(), TaskHandles { timer, listener }) {
            old.timer.abort();
            if let Some(l) = old.listener {
                l.abort();
            }
        }
    }

    /// Watch the state bus for transitions that make the scheduled
    /// action redundant, and auto-cancel when one arrives.
    fn spawn_listener(&self, entity_id: &str, scheduled: Action) -> JoinHandle<()> {
        let mut rx = self.inner.state_bus.subscribe();
        let coordinator = self.clone();
        let key = entity_id.to_string();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) if change.entity_id == key => {
                        if should_auto_cancel(scheduled, &change.old_state, &change.new_state) {
                            tracing::info!(
                                "✋ {} was changed manually, cancelling scheduled {} action",
                                key,
                                scheduled
                            );
                            // Drop our own handle without aborting: we are
                            // running inside the listener task.
                            coordinator.detach(&key, true, false).await;
                            coordinator
                                .cancel_with(&key, false, CancelReason::ManualStateChange)
                                .await;
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("⚠️ State listener for {key} lagged by {missed} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Timer-fire execution handler: fire-and-forget-once. The action
    /// is attempted exactly once; success and failure both end in
    /// cleanup, never in a retry or re-arm.
    async fn fire(&self, entity_id: String, action: Action, route: NotifyRoute) {
        // Drop our own timer handle without aborting it (we may be
        // running inside it); the listener is genuinely cancelled.
        self.detach(&entity_id, false, true).await;

        match self.inner.executor.execute(&entity_id, action).await {
            Ok(()) => {
                self.inner.events.emit(TimerEvent::TaskCompleted {
                    entity_id: entity_id.clone(),
                    action,
                });
                if !route.is_empty() {
                    let notification = Notification::new(
                        format!("Executed: {} for {entity_id}", action.name().to_uppercase()),
                        "Scheduled action completed successfully",
                        entity_id.clone(),
                    );
                    self.inner.notifier.notify(notification, &route).await;
                }
            }
            Err(e) => {
                tracing::error!("❌ Failed to execute action {} for {entity_id}: {e}", action);
                if !route.is_empty() {
                    let notification = Notification::new(
                        format!("Error: {} for {entity_id}", action.name().to_uppercase()),
                        format!("Action failed: {e}"),
                        entity_id.clone(),
                    );
                    self.inner.notifier.notify(notification, &route).await;
                }
            }
        }

        self.remove_record(&entity_id).await;
        self.push_status().await;
    }

    /// Remove the in-memory handles for a key. `abort_timer` /
    /// `abort_listener` are false on the paths that run inside the
    /// respective task (aborting yourself strands the cleanup).
    async fn detach(&self, entity_id: &str, abort_timer: bool, abort_listener: bool) {
        let removed = self.inner.handles.lock().await.remove(entity_id);
        if let Some(handles) = removed {
            if abort_timer {
                handles.timer.abort();
            }
            if let Some(listener) = handles.listener
                && abort_listener
            {
                listener.abort();
            }
        }
    }

    /// Delete the persisted record for a key, tolerating absence.
    async fn remove_record(&self, entity_id: &str) {
        match self.inner.store.lock().await.remove_task(entity_id).await {
            Ok(_) => {}
            Err(e) => tracing::warn!("⚠️ Failed to remove task record for {entity_id}: {e}"),
        }
    }

    async fn push_status(&self) {
        let snapshot = self.inner.store.lock().await.get_all_tasks();
        self.inner.board.push_tasks(snapshot);
    }

    async fn push_preference_status(&self) {
        let snapshot = self.inner.prefs.lock().await.get_all_preferences();
        self.inner.board.push_preferences(snapshot);
    }

    /// Record last-used parameters and a history entry for the entity.
    async fn remember(&self, request: &RunActionRequest, timestamp: String) -> Result<()> {
        let mut prefs = self.inner.prefs.lock().await;

        let entry = match request.time_mode {
            TimeMode::Absolute if request.at_time.is_some() => HistoryEntry {
                action: request.action,
                time_mode: TimeMode::Absolute,
                delay: None,
                unit: None,
                at_time: request.at_time.clone(),
                timestamp,
            },
            _ => HistoryEntry {
                action: request.action,
                time_mode: TimeMode::Relative,
                delay: Some(request.delay),
                unit: Some(request.unit),
                at_time: None,
                timestamp,
            },
        };
        prefs.add_to_history(&request.entity_id, entry).await?;

        let mut fields = serde_json::Map::new();
        fields.insert("last_action".into(), serde_json::json!(request.action));
        fields.insert("last_time_mode".into(), serde_json::json!(request.time_mode));
        fields.insert("last_delay".into(), serde_json::json!(request.delay));
        fields.insert("last_unit".into(), serde_json::json!(request.unit));
        fields.insert("last_at_time".into(), serde_json::json!(request.at_time));
        fields.insert("notify_ha".into(), serde_json::json!(request.notify_ha));
        fields.insert("notify_mobile".into(), serde_json::json!(request.notify_mobile));
        prefs.set_preferences(&request.entity_id, fields).await
    }
}
