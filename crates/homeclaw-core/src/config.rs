//! HomeClaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeClawConfig {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for HomeClawConfig {
    fn default() -> Self {
        Self {
            hub: HubConfig::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl HomeClawConfig {
    /// Load config from the default path (~/.homeclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::HomeClawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::HomeClawError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::HomeClawError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the HomeClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".homeclaw")
    }
}

/// Automation hub connection — where resolved service calls are sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Base URL of the hub REST API (e.g. `http://homeassistant.local:8123`).
    #[serde(default = "default_hub_url")]
    pub base_url: String,
    /// Long-lived access token for the hub API.
    #[serde(default)]
    pub token: String,
    /// Request timeout in seconds.
    #[serde(default = "default_hub_timeout")]
    pub timeout_secs: u64,
}

fn default_hub_url() -> String { "http://127.0.0.1:8123".into() }
fn default_hub_timeout() -> u64 { 10 }

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: default_hub_url(),
            token: String::new(),
            timeout_secs: default_hub_timeout(),
        }
    }
}

/// Where timer and preference state is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage directory. Empty = ~/.homeclaw/timer.
    #[serde(default)]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: String::new() }
    }
}

impl StorageConfig {
    /// Resolve the storage directory, falling back to the default.
    pub fn resolve_dir(&self) -> PathBuf {
        if self.dir.is_empty() {
            HomeClawConfig::home_dir().join("timer")
        } else {
            PathBuf::from(&self.dir)
        }
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotifyConfig {
    /// Named mobile push targets (HTTP webhooks, e.g. a companion-app relay).
    #[serde(default)]
    pub mobile_targets: Vec<PushTargetConfig>,
}

/// A single named push target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTargetConfig {
    /// Target name, referenced by `notify_devices` on a task.
    pub name: String,
    /// Webhook URL to POST notifications to.
    pub url: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HomeClawConfig::default();
        assert_eq!(config.hub.base_url, "http://127.0.0.1:8123");
        assert_eq!(config.hub.timeout_secs, 10);
        assert!(config.notify.mobile_targets.is_empty());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [hub]
            base_url = "http://hub.lan:8123"
            token = "abc"

            [[notify.mobile_targets]]
            name = "phone"
            url = "https://push.example/phone"
        "#;
        let config: HomeClawConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.base_url, "http://hub.lan:8123");
        assert_eq!(config.hub.timeout_secs, 10);
        assert_eq!(config.notify.mobile_targets.len(), 1);
        assert_eq!(config.notify.mobile_targets[0].name, "phone");
    }

    #[test]
    fn test_storage_dir_fallback() {
        let storage = StorageConfig::default();
        assert!(storage.resolve_dir().ends_with(".homeclaw/timer"));
        let custom = StorageConfig { dir: "/tmp/hc".into() };
        assert_eq!(custom.resolve_dir(), PathBuf::from("/tmp/hc"));
    }
}
