//! Task records and schedule-time computation.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use homeclaw_core::{HomeClawError, Result};
use serde::{Deserialize, Serialize};

use crate::actions::Action;

/// Relative (duration from now) vs absolute (wall-clock HH:MM) scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    #[default]
    Relative,
    Absolute,
}

/// Unit for relative delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Seconds,
    #[default]
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Multiplier to seconds.
    pub fn factor(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
        }
    }
}

/// When a task should fire, as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSpec {
    Relative { delay: u32, unit: TimeUnit },
    Absolute { at_time: String },
}

/// A resolved schedule: the moment to fire and the distance to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub end_time: DateTime<Local>,
    pub delay_seconds: i64,
}

/// Convert a relative delay to seconds.
pub fn convert_to_seconds(delay: u32, unit: TimeUnit) -> i64 {
    delay as i64 * unit.factor()
}

/// Resolve a time spec against `now`.
///
/// Absolute mode parses `HH:MM`, targets today at that time, and rolls
/// forward exactly one day when the result is not in the future (midnight
/// crossover). Malformed time strings abort with no state change.
pub fn resolve_schedule(now: DateTime<Local>, spec: &TimeSpec) -> Result<ResolvedSchedule> {
    match spec {
        TimeSpec::Relative { delay, unit } => {
            let delay_seconds = convert_to_seconds(*delay, *unit);
            Ok(ResolvedSchedule {
                end_time: now + Duration::seconds(delay_seconds),
                delay_seconds,
            })
        }
        TimeSpec::Absolute { at_time } => {
            let parsed = NaiveTime::parse_from_str(at_time, "%H:%M")
                .map_err(|_| HomeClawError::InvalidTime(at_time.clone()))?;
            let naive = now.date_naive().and_time(parsed);
            let mut end_time = Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| HomeClawError::InvalidTime(at_time.clone()))?;
            if end_time <= now {
                end_time += Duration::days(1);
                tracing::info!("🕛 {} is in the past, scheduling for tomorrow", at_time);
            }
            Ok(ResolvedSchedule {
                end_time,
                delay_seconds: (end_time - now).num_seconds(),
            })
        }
    }
}

/// Human-readable delay for notification copy ("10 minutes", "1 hour").
pub fn format_delay(delay: u32, unit: TimeUnit) -> String {
    let word = match unit {
        TimeUnit::Seconds => "second",
        TimeUnit::Minutes => "minute",
        TimeUnit::Hours => "hour",
    };
    if delay == 1 {
        format!("1 {word}")
    } else {
        format!("{delay} {word}s")
    }
}

/// A persisted scheduled task, keyed by entity id.
///
/// Timestamps are stored as RFC3339 strings so that a single corrupt
/// record can be dropped at restore time instead of poisoning the load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    /// Target entity (also the task key).
    pub entity_id: String,
    /// When the task was created.
    pub scheduled_time: String,
    /// When the action must fire.
    pub end_time: String,
    /// Distance from creation to fire time, in seconds.
    pub delay_seconds: i64,
    /// The action to perform at fire time.
    pub action: Action,
    /// The caller's requested action before run-now reversal.
    #[serde(default)]
    pub original_action: Option<Action>,
    /// Master notification switch for this task.
    #[serde(default)]
    pub notify: bool,
    /// Deliver to the in-app feed.
    #[serde(default)]
    pub notify_ha: bool,
    /// Deliver to mobile push targets.
    #[serde(default)]
    pub notify_mobile: bool,
    /// Named push targets; empty = all configured.
    #[serde(default)]
    pub notify_devices: Vec<String>,
    /// Whether the requested action was executed immediately at schedule time.
    #[serde(default)]
    pub run_now: bool,
    /// Requested wall-clock time for absolute mode.
    #[serde(default)]
    pub at_time: Option<String>,
    /// How the fire time was computed.
    #[serde(default)]
    pub time_mode: TimeMode,
}

impl TaskRecord {
    /// Parse the persisted fire time, falling back to the creation time.
    /// `None` means the record is corrupt and should be dropped.
    pub fn parse_end_time(&self) -> Option<DateTime<Local>> {
        let raw = if self.end_time.is_empty() {
            &self.scheduled_time
        } else {
            &self.end_time
        };
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Local))
    }

    /// Seconds until the fire time, clamped at zero. `None` when the
    /// persisted timestamp is unreadable.
    pub fn remaining_seconds(&self, now: DateTime<Local>) -> Option<i64> {
        self.parse_end_time()
            .map(|end| (end - now).num_seconds().max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 5, h, m, s).unwrap()
    }

    #[test]
    fn test_unit_factors() {
        assert_eq!(convert_to_seconds(10, TimeUnit::Seconds), 10);
        assert_eq!(convert_to_seconds(10, TimeUnit::Minutes), 600);
        assert_eq!(convert_to_seconds(2, TimeUnit::Hours), 7200);
    }

    #[test]
    fn test_relative_is_exact() {
        let now = at(12, 0, 0);
        let spec = TimeSpec::Relative { delay: 10, unit: TimeUnit::Minutes };
        let resolved = resolve_schedule(now, &spec).unwrap();
        assert_eq!(resolved.delay_seconds, 600);
        assert_eq!(resolved.end_time - now, Duration::seconds(600));
        assert_eq!(resolved.end_time, at(12, 10, 0));
    }

    #[test]
    fn test_absolute_same_day() {
        let now = at(9, 0, 0);
        let spec = TimeSpec::Absolute { at_time: "21:30".into() };
        let resolved = resolve_schedule(now, &spec).unwrap();
        assert_eq!(resolved.end_time, at(21, 30, 0));
        assert_eq!(resolved.delay_seconds, 12 * 3600 + 1800);
    }

    #[test]
    fn test_absolute_rolls_to_tomorrow() {
        let now = at(9, 0, 0);
        let spec = TimeSpec::Absolute { at_time: "08:00".into() };
        let resolved = resolve_schedule(now, &spec).unwrap();
        assert_eq!(
            resolved.end_time,
            Local.with_ymd_and_hms(2026, 8, 6, 8, 0, 0).unwrap()
        );
        assert_eq!(resolved.delay_seconds, 23 * 3600);
    }

    #[test]
    fn test_absolute_equal_to_now_rolls() {
        let now = at(8, 0, 0);
        let spec = TimeSpec::Absolute { at_time: "08:00".into() };
        let resolved = resolve_schedule(now, &spec).unwrap();
        assert_eq!(
            resolved.end_time,
            Local.with_ymd_and_hms(2026, 8, 6, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_absolute_malformed() {
        let now = at(9, 0, 0);
        for bad in ["8am", "25:00", "12:61", "", "12-30"] {
            let spec = TimeSpec::Absolute { at_time: bad.into() };
            assert!(resolve_schedule(now, &spec).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_format_delay() {
        assert_eq!(format_delay(1, TimeUnit::Hours), "1 hour");
        assert_eq!(format_delay(10, TimeUnit::Minutes), "10 minutes");
        assert_eq!(format_delay(45, TimeUnit::Seconds), "45 seconds");
    }

    #[test]
    fn test_parse_end_time_fallback_and_corrupt() {
        let mut record = TaskRecord {
            entity_id: "light.x".into(),
            scheduled_time: at(12, 0, 0).to_rfc3339(),
            end_time: String::new(),
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
        };
        // Empty end_time falls back to scheduled_time
        assert_eq!(record.parse_end_time().unwrap(), at(12, 0, 0));

        record.end_time = at(12, 10, 0).to_rfc3339();
        assert_eq!(record.parse_end_time().unwrap(), at(12, 10, 0));

        record.end_time = "not-a-timestamp".into();
        assert!(record.parse_end_time().is_none());
    }

    #[test]
    fn test_remaining_seconds_clamps_at_zero() {
        let record = TaskRecord {
            entity_id: "light.x".into(),
            scheduled_time: at(12, 0, 0).to_rfc3339(),
            end_time: at(12, 10, 0).to_rfc3339(),
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
        };
        assert_eq!(record.remaining_seconds(at(12, 3, 0)), Some(420));
        assert_eq!(record.remaining_seconds(at(12, 10, 0)), Some(0));
        assert_eq!(record.remaining_seconds(at(13, 0, 0)), Some(0));
    }
}
