//! Action execution port — turns abstract actions into hub service calls.

use async_trait::async_trait;
use homeclaw_core::config::HubConfig;
use homeclaw_core::{HomeClawError, Result};

use crate::actions::{self, Action};

/// Executes resolved actions against the automation host.
///
/// Implementations may fail transiently; the coordinator catches and
/// reports failures, it never lets them propagate as a crash.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, entity_id: &str, action: Action) -> Result<()>;
}

/// REST executor — posts resolved service calls to the hub API
/// (`POST {base}/api/services/{domain}/{service}`).
pub struct RestExecutor {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: std::time::Duration,
}

impl RestExecutor {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ActionExecutor for RestExecutor {
    async fn execute(&self, entity_id: &str, action: Action) -> Result<()> {
        let call = actions::resolve(entity_id, action);
        let url = format!("{}/api/services/{}/{}", self.base_url, call.domain, call.service);

        let mut body = serde_json::json!({ "entity_id": entity_id });
        for (key, value) in &call.extra {
            body[*key] = serde_json::Value::String((*value).to_string());
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| HomeClawError::Executor(format!("{}.{}: {e}", call.domain, call.service)))?;

        if resp.status().is_success() {
            tracing::info!(
                "✅ Executed {} ({}.{}) for {}",
                action,
                call.domain,
                call.service,
                entity_id
            );
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            Err(HomeClawError::Executor(format!(
                "{}.{} for {entity_id}: hub returned {status}: {text}",
                call.domain, call.service
            )))
        }
    }
}
