//! File-based task store — versioned JSON persistence for scheduled tasks.
//!
//! Every mutation persists the full map before returning. The on-disk
//! payload carries a schema version; additive bumps backfill defaults
//! per record, breaking bumps discard the old data and start empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use homeclaw_core::{HomeClawError, Result};
use serde::{Deserialize, Serialize};

use crate::tasks::TaskRecord;

/// Current task storage schema version.
///
/// v1 keyed records by an opaque task id with start/finish action arrays;
/// v2 rekeyed by entity id with a single action field (breaking — v1 data
/// is discarded on load); v3 added notify_devices / at_time / time_mode
/// (additive — v2 records load with defaults).
pub const STORE_VERSION: u32 = 3;

/// Oldest version that can still be loaded. Anything older changed record
/// identity and is dropped wholesale.
const OLDEST_COMPATIBLE_VERSION: u32 = 2;

#[derive(Serialize, Deserialize)]
struct StoreEnvelope {
    version: u32,
    #[serde(default)]
    tasks: HashMap<String, serde_json::Value>,
}

/// Durable map of entity id → scheduled task.
pub struct TaskStore {
    path: PathBuf,
    data: HashMap<String, TaskRecord>,
}

impl TaskStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.join("tasks.json"),
            data: HashMap::new(),
        }
    }

    /// Default store directory (~/.homeclaw/timer).
    pub fn default_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".homeclaw").join("timer")
    }

    /// Load tasks from disk, migrating old payloads.
    pub async fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            self.data = HashMap::new();
            return Ok(());
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        let envelope: StoreEnvelope = match serde_json::from_str(&json) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("⚠️ Failed to parse {}: {e} — starting empty", self.path.display());
                self.data = HashMap::new();
                return Ok(());
            }
        };
        self.data = migrate(envelope.version, envelope.tasks);
        tracing::debug!("💾 Loaded {} scheduled tasks", self.data.len());
        Ok(())
    }

    /// Persist the full map. Durable (temp file + rename) before returning.
    pub async fn save(&self) -> Result<()> {
        let envelope = serde_json::json!({
            "version": STORE_VERSION,
            "tasks": self.data,
        });
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| HomeClawError::Storage(format!("Serialize tasks: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!("💾 Saved {} scheduled tasks", self.data.len());
        Ok(())
    }

    /// Insert or overwrite a task and persist.
    pub async fn add_task(&mut self, record: TaskRecord) -> Result<()> {
        tracing::info!(
            "📅 Task stored: {} → {} at {}",
            record.entity_id,
            record.action,
            record.end_time
        );
        self.data.insert(record.entity_id.clone(), record);
        self.save().await
    }

    /// Remove a task and persist. Returns whether anything was removed.
    pub async fn remove_task(&mut self, entity_id: &str) -> Result<bool> {
        if self.data.remove(entity_id).is_some() {
            self.save().await?;
            tracing::debug!("🗑️ Task removed: {entity_id}");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Get one task.
    pub fn get_task(&self, entity_id: &str) -> Option<&TaskRecord> {
        self.data.get(entity_id)
    }

    /// Snapshot of all tasks.
    pub fn get_all_tasks(&self) -> HashMap<String, TaskRecord> {
        self.data.clone()
    }

    /// Whether a task exists for the key.
    pub fn has_task(&self, entity_id: &str) -> bool {
        self.data.contains_key(entity_id)
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Migrate a stored payload to the current schema.
fn migrate(
    version: u32,
    raw: HashMap<String, serde_json::Value>,
) -> HashMap<String, TaskRecord> {
    if version < OLDEST_COMPATIBLE_VERSION || version > STORE_VERSION {
        // Record identity changed (or the payload is from the future):
        // discard and start fresh. Users reschedule their timers.
        tracing::warn!(
            "⚠️ Task storage v{version} is incompatible with v{STORE_VERSION} — discarding old tasks"
        );
        return HashMap::new();
    }
    if version < STORE_VERSION {
        tracing::info!("💾 Migrating task storage v{version} → v{STORE_VERSION}");
    }
    // Additive bumps: serde defaults backfill the missing fields.
    let mut tasks = HashMap::new();
    for (key, value) in raw {
        match serde_json::from_value::<TaskRecord>(value) {
            Ok(record) => {
                tasks.insert(key, record);
            }
            Err(e) => {
                tracing::warn!("⚠️ Dropping unreadable task record '{key}': {e}");
            }
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::tasks::TimeMode;

    fn record(entity_id: &str, action: Action) -> TaskRecord {
        TaskRecord {
            entity_id: entity_id.into(),
            scheduled_time: "2026-08-05T12:00:00+00:00".into(),
            end_time: "2026-08-05T12:10:00+00:00".into(),
            delay_seconds: 600,
            action,
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

    fn temp_store(name: &str) -> (PathBuf, TaskStore) {
        let dir = std::env::temp_dir().join(format!("homeclaw-test-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        let store = TaskStore::new(&dir);
        (dir, store)
    }

    #[tokio::test]
    async fn test_add_remove_roundtrip() {
        let (dir, mut store) = temp_store("store-roundtrip");
        store.add_task(record("light.x", Action::Off)).await.unwrap();
        store.add_task(record("switch.y", Action::On)).await.unwrap();
        assert_eq!(store.len(), 2);

        // Reload from disk
        let mut reloaded = TaskStore::new(&dir);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get_task("light.x").unwrap().action, Action::Off);

        assert!(reloaded.remove_task("light.x").await.unwrap());
        assert!(!reloaded.remove_task("light.x").await.unwrap());
        assert!(!reloaded.has_task("light.x"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_add_is_upsert() {
        let (dir, mut store) = temp_store("store-upsert");
        store.add_task(record("light.x", Action::Off)).await.unwrap();
        store.add_task(record("light.x", Action::Toggle)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_task("light.x").unwrap().action, Action::Toggle);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_breaking_version_discards() {
        let (dir, _) = temp_store("store-breaking");
        let old = serde_json::json!({
            "version": 1,
            "tasks": {
                "task-abc123": {
                    "task_id": "task-abc123",
                    "start_actions": [],
                    "finish_actions": [{"entity_id": "light.x", "action": "off"}],
                    "scheduled_time": "2026-08-05T12:00:00+00:00"
                }
            }
        });
        std::fs::write(dir.join("tasks.json"), old.to_string()).unwrap();

        let mut store = TaskStore::new(&dir);
        store.load().await.unwrap();
        assert!(store.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_additive_version_backfills_defaults() {
        let (dir, _) = temp_store("store-additive");
        // v2 record: no notify_devices / at_time / time_mode fields yet
        let old = serde_json::json!({
            "version": 2,
            "tasks": {
                "light.x": {
                    "entity_id": "light.x",
                    "scheduled_time": "2026-08-05T12:00:00+00:00",
                    "end_time": "2026-08-05T12:10:00+00:00",
                    "delay_seconds": 600,
                    "action": "off",
                    "notify": true
                }
            }
        });
        std::fs::write(dir.join("tasks.json"), old.to_string()).unwrap();

        let mut store = TaskStore::new(&dir);
        store.load().await.unwrap();
        let task = store.get_task("light.x").unwrap();
        assert!(task.notify);
        assert!(task.notify_devices.is_empty());
        assert_eq!(task.at_time, None);
        assert_eq!(task.time_mode, TimeMode::Relative);
        assert!(!task.run_now);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unparsable_file_starts_empty() {
        let (dir, _) = temp_store("store-corrupt");
        std::fs::write(dir.join("tasks.json"), "{ not json").unwrap();
        let mut store = TaskStore::new(&dir);
        store.load().await.unwrap();
        assert!(store.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unreadable_record_dropped_alone() {
        let (dir, _) = temp_store("store-bad-record");
        let payload = serde_json::json!({
            "version": 3,
            "tasks": {
                "light.ok": serde_json::to_value(record("light.ok", Action::Off)).unwrap(),
                "light.bad": {"entity_id": "light.bad", "action": "explode"}
            }
        });
        std::fs::write(dir.join("tasks.json"), payload.to_string()).unwrap();
        let mut store = TaskStore::new(&dir);
        store.load().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.has_task("light.ok"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
