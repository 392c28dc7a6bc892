//! Notification delivery — best-effort, never blocks scheduling.
//!
//! Two channels: an in-app feed (bounded in-memory history that a
//! dashboard or sensor can read) and named mobile push targets reached
//! over HTTP. Every delivery failure is logged and swallowed.

use std::sync::Mutex;

use async_trait::async_trait;
use homeclaw_core::config::{NotifyConfig, PushTargetConfig};
use serde::{Deserialize, Serialize};

/// A (title, message) pair to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Which entity/task produced this.
    pub source: String,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            source: source.into(),
            timestamp: chrono::Local::now(),
        }
    }
}

/// Where one notification should go.
#[derive(Debug, Clone, Default)]
pub struct NotifyRoute {
    /// In-app feed.
    pub ha: bool,
    /// Mobile push targets.
    pub mobile: bool,
    /// Named targets; empty = all configured.
    pub devices: Vec<String>,
}

impl NotifyRoute {
    pub fn is_empty(&self) -> bool {
        !self.ha && !self.mobile
    }
}

/// Delivery port. Must never error back into the scheduler.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification, route: &NotifyRoute);
}

/// In-app feed entries kept in memory.
const FEED_CAPACITY: usize = 100;

/// Default notifier: in-app feed + HTTP push to configured targets.
pub struct ChannelNotifier {
    feed: Mutex<Vec<Notification>>,
    targets: Vec<PushTargetConfig>,
    client: reqwest::Client,
}

impl ChannelNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            feed: Mutex::new(Vec::new()),
            targets: config.mobile_targets.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Snapshot of the in-app feed, newest last.
    pub fn feed(&self) -> Vec<Notification> {
        self.feed.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn record(&self, notification: &Notification) {
        if let Ok(mut feed) = self.feed.lock() {
            feed.push(notification.clone());
            if feed.len() > FEED_CAPACITY {
                feed.remove(0);
            }
        }
    }

    async fn push(&self, target: &PushTargetConfig, notification: &Notification) {
        let mut req = self
            .client
            .post(&target.url)
            .json(&serde_json::json!({
                "title": notification.title,
                "message": notification.body,
                "data": { "tag": "homeclaw_timer", "importance": "high" },
            }))
            .timeout(std::time::Duration::from_secs(10));
        for (key, value) in &target.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("📲 Push sent to {}", target.name);
            }
            Ok(resp) => {
                tracing::warn!("⚠️ Push to {} returned {}", target.name, resp.status());
            }
            Err(e) => {
                tracing::warn!("⚠️ Push to {} failed: {e}", target.name);
            }
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification, route: &NotifyRoute) {
        if route.ha {
            self.record(&notification);
        }
        if route.mobile {
            let selected: Vec<&PushTargetConfig> = if route.devices.is_empty() {
                self.targets.iter().collect()
            } else {
                self.targets
                    .iter()
                    .filter(|t| route.devices.contains(&t.name))
                    .collect()
            };
            if selected.is_empty() {
                tracing::debug!("📲 No mobile push targets configured");
            }
            for target in selected {
                self.push(target, &notification).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_records_and_bounds() {
        let notifier = ChannelNotifier::new(&NotifyConfig::default());
        let route = NotifyRoute { ha: true, mobile: false, devices: Vec::new() };
        for i in 0..(FEED_CAPACITY + 5) {
            notifier
                .notify(Notification::new(format!("t{i}"), "body", "light.x"), &route)
                .await;
        }
        let feed = notifier.feed();
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert_eq!(feed.last().unwrap().title, format!("t{}", FEED_CAPACITY + 4));
    }

    #[tokio::test]
    async fn test_ha_disabled_records_nothing() {
        let notifier = ChannelNotifier::new(&NotifyConfig::default());
        let route = NotifyRoute { ha: false, mobile: false, devices: Vec::new() };
        notifier
            .notify(Notification::new("t", "body", "light.x"), &route)
            .await;
        assert!(notifier.feed().is_empty());
    }
}
