// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! "Due now in UTC" logic shared by both schedule stores: a one-shot is due
//! once `once_at` has passed, a daily entry is due when the wall-clock time
//! in its timezone matches `HH:MM`, and a cron entry is due when its
//! schedule has a fire time inside the current minute.
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::Error;
use crate::model::{NotificationEntry, NotificationScheduleType, ReachSchedule, Trigger};

pub fn parse_timezone(tz: Option<&str>) -> Result<Tz, Error> {
    match tz {
        None => Ok(Tz::UTC),
        Some(s) => s.parse::<Tz>().map_err(|_| Error::InvalidTimezone(s.to_string())),
    }
}

pub fn parse_hhmm(hhmm: &str) -> Result<(u32, u32), Error> {
    hhmm.split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .filter(|(h, m)| *h <= 23 && *m <= 59)
        .ok_or_else(|| Error::InvalidTimeOfDay(hhmm.to_string()))
}

fn daily_due_now(time_hhmm: &str, tz: Tz, now_utc: DateTime<Utc>) -> Result<bool, Error> {
    let (h, m) = parse_hhmm(time_hhmm)?;
    let now_local = now_utc.with_timezone(&tz);
    Ok(now_local.hour() == h && now_local.minute() == m)
}

fn cron_due_now(expr: &str, tz: Tz, now_utc: DateTime<Utc>) -> Result<bool, Error> {
    let schedule: cron::Schedule =
        expr.parse().map_err(|e: cron::error::Error| Error::InvalidCron(expr.to_string(), e.to_string()))?;
    let now_local = now_utc.with_timezone(&tz);
    let current_minute = now_local.format("%Y-%m-%d %H:%M").to_string();
    let probe = now_local - chrono::Duration::seconds(60);
    Ok(schedule
        .after(&probe)
        .next()
        .map(|next| next.format("%Y-%m-%d %H:%M").to_string() == current_minute)
        .unwrap_or(false))
}

fn once_due_now(at: &str, now_utc: DateTime<Utc>) -> Result<bool, Error> {
    let at = DateTime::parse_from_rfc3339(at).map_err(|_| Error::InvalidTimeOfDay(at.to_string()))?;
    Ok(at.with_timezone(&Utc) <= now_utc)
}

/// `true` if this reach schedule should fire right now.
pub fn reach_schedule_due(schedule: &ReachSchedule, now_utc: DateTime<Utc>) -> Result<bool, Error> {
    if !schedule.enabled {
        return Ok(false);
    }
    match schedule.trigger()? {
        Trigger::Daily { time, timezone } => daily_due_now(time, parse_timezone(timezone)?, now_utc),
        Trigger::Cron { expr, timezone } => cron_due_now(expr, parse_timezone(timezone)?, now_utc),
        Trigger::OnceAt { at } => once_due_now(at, now_utc),
    }
}

/// Next occurrence of `HH:MM` in `tz` strictly after `now_utc`, as an
/// RFC3339 UTC string.
pub fn next_daily_occurrence(time_hhmm: &str, tz: Tz, now_utc: DateTime<Utc>) -> Result<String, Error> {
    let (h, m) = parse_hhmm(time_hhmm)?;
    let now_local = now_utc.with_timezone(&tz);
    let today = candidate(now_local.date_naive(), h, m, tz)?;
    let next_local = if today > now_local { today } else { candidate(now_local.date_naive() + chrono::Duration::days(1), h, m, tz)? };
    Ok(next_local.with_timezone(&Utc).to_rfc3339())
}

fn candidate(date: NaiveDate, h: u32, m: u32, tz: Tz) -> Result<DateTime<Tz>, Error> {
    let naive = date
        .and_time(NaiveTime::from_hms_opt(h, m, 0).ok_or_else(|| Error::InvalidTimeOfDay(format!("{h}:{m}")))?);
    tz.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| Error::InvalidTimeOfDay(format!("{h}:{m}")))
}

/// `true` if this notification entry should fire right now. For a `daily`
/// entry whose `next_run` has never been materialized, it is computed here
/// (mutating `entry`) before the due check, per the "daily entries always
/// materialize `next_run` on first observation" invariant.
pub fn notification_due(entry: &mut NotificationEntry, now_utc: DateTime<Utc>) -> Result<bool, Error> {
    if !entry.enabled {
        return Ok(false);
    }
    let tz = parse_timezone(entry.timezone.as_deref())?;
    match entry.schedule_type {
        NotificationScheduleType::Once => {
            let at = entry.next_run.as_deref().or(entry.once_at.as_deref()).ok_or(Error::AmbiguousTrigger)?;
            once_due_now(at, now_utc)
        }
        NotificationScheduleType::Daily => {
            let time = entry.time.as_deref().ok_or(Error::AmbiguousTrigger)?;
            if entry.next_run.is_none() {
                entry.next_run = Some(next_daily_occurrence(time, tz, now_utc)?);
            }
            let next_run = entry.next_run.as_deref().unwrap();
            let due = once_due_now(next_run, now_utc)?;
            Ok(due && daily_due_now(time, tz, now_utc)?)
        }
    }
}

/// Advance a fired daily notification's `next_run` to the next occurrence
/// strictly in the future relative to `now_utc`.
pub fn advance_daily_next_run(entry: &mut NotificationEntry, now_utc: DateTime<Utc>) -> Result<(), Error> {
    let tz = parse_timezone(entry.timezone.as_deref())?;
    let time = entry.time.as_deref().ok_or(Error::AmbiguousTrigger)?;
    entry.last_run = Some(now_utc.to_rfc3339());
    entry.next_run = Some(next_daily_occurrence(time, tz, now_utc)?);
    Ok(())
}

/// Advance a fired daily reach schedule so the base-spec invariant ("a
/// daily schedule, once fired, has `next_run` strictly in the future") also
/// holds for the CLI-managed store, which otherwise recomputes due-now from
/// the bare `time` field every tick rather than materializing `next_run`.
pub fn daily_schedule_next_run(schedule: &ReachSchedule, now_utc: DateTime<Utc>) -> Result<String, Error> {
    let time = schedule.time.as_deref().ok_or(Error::AmbiguousTrigger)?;
    let tz = parse_timezone(schedule.timezone.as_deref())?;
    next_daily_occurrence(time, tz, now_utc)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn once_due_when_in_the_past() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert!(once_due_now("2026-01-01T11:59:59Z", now).unwrap());
        assert!(!once_due_now("2026-01-01T12:00:01Z", now).unwrap());
    }

    #[test]
    fn daily_due_matches_local_hhmm() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        assert!(daily_due_now("09:00", Tz::UTC, now).unwrap());
        assert!(!daily_due_now("09:01", Tz::UTC, now).unwrap());
    }

    #[test]
    fn daily_due_honors_timezone_offset() {
        // 09:00 in America/New_York (UTC-5 in January) is 14:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap();
        let tz: Tz = "America/New_York".parse().unwrap();
        assert!(daily_due_now("09:00", tz, now).unwrap());
    }

    #[test]
    fn cron_due_matches_current_minute() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 5, 0).unwrap();
        // sec min hour dom month dow
        assert!(cron_due_now("0 5 9 * * *", Tz::UTC, now).unwrap());
        assert!(!cron_due_now("0 6 9 * * *", Tz::UTC, now).unwrap());
    }

    #[test]
    fn invalid_cron_expression_is_reported() {
        assert!(cron_due_now("not a cron", Tz::UTC, Utc::now()).is_err());
    }

    #[test]
    fn next_daily_occurrence_rolls_to_tomorrow_when_past() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let next = next_daily_occurrence("09:00", Tz::UTC, now).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&next).unwrap();
        assert_eq!(parsed.day(), 2);
    }

    #[test]
    fn next_daily_occurrence_stays_today_when_still_ahead() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let next = next_daily_occurrence("09:00", Tz::UTC, now).unwrap();
        let parsed = DateTime::parse_from_rfc3339(&next).unwrap();
        assert_eq!(parsed.day(), 1);
    }

    #[test]
    fn notification_due_materializes_next_run_on_first_observation() {
        let mut entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type: NotificationScheduleType::Daily,
            message: "hi".into(),
            target: "all".into(),
            enabled: true,
            time: Some("09:00".into()),
            once_at: None,
            last_run: None,
            next_run: None,
            timezone: None,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let due = notification_due(&mut entry, now).unwrap();
        assert!(!due);
        assert!(entry.next_run.is_some());
    }

    #[test]
    fn notification_due_fires_exactly_at_next_run() {
        let mut entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type: NotificationScheduleType::Daily,
            message: "hi".into(),
            target: "all".into(),
            enabled: true,
            time: Some("09:00".into()),
            once_at: None,
            last_run: None,
            next_run: None,
            timezone: None,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        assert!(notification_due(&mut entry, now).unwrap());
    }

    #[test]
    fn advance_daily_next_run_moves_strictly_forward() {
        let mut entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type: NotificationScheduleType::Daily,
            message: "hi".into(),
            target: "all".into(),
            enabled: true,
            time: Some("09:00".into()),
            once_at: None,
            last_run: None,
            next_run: Some("2026-01-01T09:00:00+00:00".into()),
            timezone: None,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        advance_daily_next_run(&mut entry, now).unwrap();
        let next = DateTime::parse_from_rfc3339(entry.next_run.as_deref().unwrap()).unwrap();
        assert!(next.with_timezone(&Utc) > now);
    }

    #[test]
    fn disabled_entries_are_never_due() {
        let mut entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type: NotificationScheduleType::Once,
            message: "hi".into(),
            target: "all".into(),
            enabled: false,
            time: None,
            once_at: Some("2000-01-01T00:00:00Z".into()),
            last_run: None,
            next_run: None,
            timezone: None,
        };
        let now = Utc::now();
        assert!(!notification_due(&mut entry, now).unwrap());
    }
}
