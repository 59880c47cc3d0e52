// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! On-disk shapes for reach schedules and scheduled notifications.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// One of three mutually-exclusive triggers a [`ReachSchedule`] can carry.
pub enum Trigger<'a> {
    Daily { time: &'a str, timezone: Option<&'a str> },
    Cron { expr: &'a str, timezone: Option<&'a str> },
    OnceAt { at: &'a str },
}

/// A user-defined reach schedule: recurring daily, recurring cron, or a
/// one-shot. Exactly one of `time`/`cron`/`once_at` is set, enforced by
/// [`ReachSchedule::new`] rather than the type system, to keep the on-disk
/// shape a flat, forward-compatible JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachSchedule {
    pub id: Uuid,
    pub time: Option<String>,
    pub cron: Option<String>,
    pub once_at: Option<String>,
    pub message: String,
    pub channel: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub timezone: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ReachSchedule {
    pub fn daily(time: String, timezone: Option<String>, message: String, channel: String) -> Result<Self, Error> {
        validate_time_of_day(&time)?;
        Ok(Self {
            id: Uuid::new_v4(),
            time: Some(time),
            cron: None,
            once_at: None,
            message,
            channel,
            enabled: true,
            timezone,
        })
    }

    pub fn cron(expr: String, timezone: Option<String>, message: String, channel: String) -> Result<Self, Error> {
        expr.parse::<cron::Schedule>().map_err(|e| Error::InvalidCron(expr.clone(), e.to_string()))?;
        Ok(Self {
            id: Uuid::new_v4(),
            time: None,
            cron: Some(expr),
            once_at: None,
            message,
            channel,
            enabled: true,
            timezone,
        })
    }

    pub fn once_at(at: String, message: String, channel: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            time: None,
            cron: None,
            once_at: Some(at),
            message,
            channel,
            enabled: true,
            timezone: None,
        }
    }

    pub fn trigger(&self) -> Result<Trigger<'_>, Error> {
        match (&self.time, &self.cron, &self.once_at) {
            (Some(t), None, None) => Ok(Trigger::Daily { time: t, timezone: self.timezone.as_deref() }),
            (None, Some(c), None) => Ok(Trigger::Cron { expr: c, timezone: self.timezone.as_deref() }),
            (None, None, Some(o)) => Ok(Trigger::OnceAt { at: o }),
            _ => Err(Error::AmbiguousTrigger),
        }
    }

    pub fn is_one_shot(&self) -> bool {
        self.once_at.is_some()
    }
}

fn validate_time_of_day(hhmm: &str) -> Result<(), Error> {
    let (h, m) = hhmm
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .ok_or_else(|| Error::InvalidTimeOfDay(hhmm.to_string()))?;
    if h > 23 || m > 59 {
        return Err(Error::InvalidTimeOfDay(hhmm.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReachScheduleStore {
    pub schedules: Vec<ReachSchedule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScheduleType {
    Daily,
    Once,
}

/// A scheduled notification targeting a specific chat or all paired users,
/// distinct from [`ReachSchedule`] in that it materializes `next_run` up
/// front rather than recomputing "due now" from a bare time string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub id: Uuid,
    pub schedule_type: NotificationScheduleType,
    pub message: String,
    pub target: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub time: Option<String>,
    pub once_at: Option<String>,
    pub last_run: Option<String>,
    pub next_run: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStore {
    pub notifications: Vec<NotificationEntry>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_schedule_validates_time_of_day() {
        assert!(ReachSchedule::daily("25:00".into(), None, "hi".into(), "telegram".into()).is_err());
        assert!(ReachSchedule::daily("09:30".into(), None, "hi".into(), "telegram".into()).is_ok());
    }

    #[test]
    fn cron_schedule_validates_expression() {
        assert!(ReachSchedule::cron("not a cron".into(), None, "hi".into(), "telegram".into()).is_err());
        assert!(ReachSchedule::cron("0 9 * * * *".into(), None, "hi".into(), "telegram".into()).is_ok());
    }

    #[test]
    fn trigger_reflects_the_set_field() {
        let s = ReachSchedule::daily("09:00".into(), None, "hi".into(), "telegram".into()).unwrap();
        assert!(matches!(s.trigger().unwrap(), Trigger::Daily { .. }));
    }

    #[test]
    fn is_one_shot_true_only_for_once_at() {
        let daily = ReachSchedule::daily("09:00".into(), None, "hi".into(), "telegram".into()).unwrap();
        let once = ReachSchedule::once_at("2026-01-01T00:00:00Z".into(), "hi".into(), "telegram".into());
        assert!(!daily.is_one_shot());
        assert!(once.is_one_shot());
    }
}
