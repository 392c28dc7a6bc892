//! Inbound command shapes — the host-agnostic request types the
//! coordinator is driven with, and their validation.

use homeclaw_core::{HomeClawError, Result};
use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::notify::NotifyRoute;
use crate::tasks::{TimeMode, TimeSpec, TimeUnit};

/// Valid relative delay range, inclusive.
pub const MIN_DELAY: u32 = 1;
pub const MAX_DELAY: u32 = 86_400;

/// A request to schedule a one-shot action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunActionRequest {
    pub entity_id: String,
    pub action: Action,
    /// Relative delay amount.
    #[serde(default = "default_delay")]
    pub delay: u32,
    #[serde(default)]
    pub unit: TimeUnit,
    /// Master notification switch (gates cancellation notices).
    #[serde(default)]
    pub notify: bool,
    /// Execute the requested action immediately and schedule its reverse.
    #[serde(default)]
    pub run_now: bool,
    #[serde(default)]
    pub notify_ha: bool,
    #[serde(default)]
    pub notify_mobile: bool,
    /// Named push targets; empty = all configured.
    #[serde(default)]
    pub notify_devices: Vec<String>,
    /// Wall-clock fire time for absolute mode, "HH:MM".
    #[serde(default)]
    pub at_time: Option<String>,
    #[serde(default)]
    pub time_mode: TimeMode,
}

fn default_delay() -> u32 { 15 }

impl RunActionRequest {
    /// Minimal request with defaults for everything optional.
    pub fn new(entity_id: impl Into<String>, action: Action) -> Self {
        Self {
            entity_id: entity_id.into(),
            action,
            delay: default_delay(),
            unit: TimeUnit::default(),
            notify: false,
            run_now: false,
            notify_ha: false,
            notify_mobile: false,
            notify_devices: Vec::new(),
            at_time: None,
            time_mode: TimeMode::default(),
        }
    }

    /// Check ranges and shapes. Time-string parsing happens at
    /// resolution; this rejects what can be rejected without a clock.
    pub fn validate(&self) -> Result<()> {
        if !self.entity_id.contains('.') {
            return Err(HomeClawError::Validation(format!(
                "'{}' is not an entity id (expected domain.object)",
                self.entity_id
            )));
        }
        if !(MIN_DELAY..=MAX_DELAY).contains(&self.delay) {
            return Err(HomeClawError::Validation(format!(
                "delay {} out of range [{MIN_DELAY}, {MAX_DELAY}]",
                self.delay
            )));
        }
        Ok(())
    }

    /// The effective time spec. Absolute mode without an `at_time`
    /// falls back to the relative delay.
    pub fn time_spec(&self) -> TimeSpec {
        match (&self.time_mode, &self.at_time) {
            (TimeMode::Absolute, Some(at_time)) => TimeSpec::Absolute { at_time: at_time.clone() },
            _ => TimeSpec::Relative { delay: self.delay, unit: self.unit },
        }
    }

    /// Notification routing for this task's lifecycle notices.
    pub fn route(&self) -> NotifyRoute {
        NotifyRoute {
            ha: self.notify_ha,
            mobile: self.notify_mobile,
            devices: self.notify_devices.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let request: RunActionRequest =
            serde_json::from_str(r#"{"entity_id": "light.x", "action": "off"}"#).unwrap();
        assert_eq!(request.delay, 15);
        assert_eq!(request.unit, TimeUnit::Minutes);
        assert_eq!(request.time_mode, TimeMode::Relative);
        assert!(!request.run_now);
        assert!(!request.notify);
        request.validate().unwrap();
    }

    #[test]
    fn test_delay_range() {
        let mut request = RunActionRequest::new("light.x", Action::Off);
        request.delay = 0;
        assert!(request.validate().is_err());
        request.delay = 86_400;
        assert!(request.validate().is_ok());
        request.delay = 86_401;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_entity_id_shape() {
        let request = RunActionRequest::new("not-an-entity", Action::Off);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_time_spec_fallback() {
        let mut request = RunActionRequest::new("light.x", Action::Off);
        request.time_mode = TimeMode::Absolute;
        // No at_time: falls back to the relative delay
        assert_eq!(
            request.time_spec(),
            TimeSpec::Relative { delay: 15, unit: TimeUnit::Minutes }
        );
        request.at_time = Some("08:00".into());
        assert_eq!(request.time_spec(), TimeSpec::Absolute { at_time: "08:00".into() });
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = serde_json::from_str::<RunActionRequest>(
            r#"{"entity_id": "light.x", "action": "levitate"}"#,
        );
        assert!(result.is_err());
    }
}
