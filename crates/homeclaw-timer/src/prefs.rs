//! Preference store — last-used parameters and a short rolling history
//! per entity. Lives in its own file with its own schema version, so
//! preferences outlive the tasks that produced them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use homeclaw_core::{HomeClawError, Result};
use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::tasks::{TimeMode, TimeUnit};

/// Current preference storage schema version.
pub const PREFS_VERSION: u32 = 1;

/// History entries kept per entity.
const MAX_HISTORY: usize = 3;

/// One remembered way of scheduling an entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub action: Action,
    pub time_mode: TimeMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimeUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_time: Option<String>,
    pub timestamp: String,
}

impl HistoryEntry {
    /// Composite identity over every parameter field (timestamp excluded).
    /// Two entries with the same key are the same way of scheduling.
    fn dedup_key(&self) -> (TimeMode, Option<u32>, Option<TimeUnit>, Option<&str>, Action) {
        (
            self.time_mode,
            self.delay,
            self.unit,
            self.at_time.as_deref(),
            self.action,
        )
    }
}

/// Per-entity preferences: free-form last-used fields plus bounded history.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PreferenceRecord {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize)]
struct PrefsEnvelope {
    version: u32,
    #[serde(default)]
    preferences: HashMap<String, PreferenceRecord>,
}

/// Durable map of entity id → preference record.
pub struct PreferenceStore {
    path: PathBuf,
    data: HashMap<String, PreferenceRecord>,
}

impl PreferenceStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            path: dir.join("preferences.json"),
            data: HashMap::new(),
        }
    }

    /// Load preferences from disk.
    pub async fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            self.data = HashMap::new();
            return Ok(());
        }
        let json = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str::<PrefsEnvelope>(&json) {
            Ok(envelope) if envelope.version == PREFS_VERSION => {
                self.data = envelope.preferences;
            }
            Ok(envelope) => {
                tracing::warn!(
                    "⚠️ Preference storage v{} is incompatible with v{PREFS_VERSION} — starting fresh",
                    envelope.version
                );
                self.data = HashMap::new();
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to parse {}: {e} — starting fresh", self.path.display());
                self.data = HashMap::new();
            }
        }
        tracing::debug!("💾 Loaded preferences for {} entities", self.data.len());
        Ok(())
    }

    /// Persist the full map. Durable (temp file + rename) before returning.
    pub async fn save(&self) -> Result<()> {
        let envelope = serde_json::json!({
            "version": PREFS_VERSION,
            "preferences": self.data,
        });
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| HomeClawError::Storage(format!("Serialize preferences: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Shallow-merge fields into an entity's record: new keys are added,
    /// existing keys overwritten, untouched keys preserved. Any history
    /// is truncated to the bound as a side effect.
    pub async fn set_preferences(
        &mut self,
        entity_id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let record = self.data.entry(entity_id.to_string()).or_default();
        for (key, value) in fields {
            record.fields.insert(key, value);
        }
        record.history.truncate(MAX_HISTORY);
        self.save().await?;
        tracing::debug!("💾 Updated preferences for {entity_id}");
        Ok(())
    }

    /// Record a scheduling in the entity's history: duplicates (by the
    /// composite parameter key) are removed, the entry goes to the front,
    /// and the history is truncated to the last 3 distinct entries.
    pub async fn add_to_history(&mut self, entity_id: &str, entry: HistoryEntry) -> Result<()> {
        let record = self.data.entry(entity_id.to_string()).or_default();
        let key = entry.dedup_key();
        record.history.retain(|h| h.dedup_key() != key);
        record.history.insert(0, entry);
        record.history.truncate(MAX_HISTORY);
        self.save().await?;
        tracing::debug!("💾 Added history entry for {entity_id}");
        Ok(())
    }

    /// Clone of one entity's record. Mutating the result never touches
    /// store state.
    pub fn get_preferences(&self, entity_id: &str) -> Option<PreferenceRecord> {
        self.data.get(entity_id).cloned()
    }

    /// Clone of the full preference map.
    pub fn get_all_preferences(&self) -> HashMap<String, PreferenceRecord> {
        self.data.clone()
    }
}
