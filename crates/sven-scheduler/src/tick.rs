// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The scheduler tick: load both stores, fire whatever is due, and persist
//! the resulting state. One-shots are removed after firing; dailies
//! recompute their next occurrence; cron entries fire with no bookkeeping
//! beyond the tick itself being minute-exact.
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::due::{advance_daily_next_run, notification_due, reach_schedule_due};
use crate::model::NotificationScheduleType;
use crate::notify::ChatSender;
use crate::store::{load_notifications, load_reach_schedules, save_notifications, save_reach_schedules};

pub const DEFAULT_INTERVAL_SECS: u64 = 90;

/// Outcome of one tick, surfaced for CLI `--reach-fire` and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub reach_fired: Vec<uuid::Uuid>,
    pub notifications_fired: Vec<uuid::Uuid>,
}

/// Run a single scheduler tick against both stores. Per-entry failures
/// (bad cron, bad timezone, send failure) are logged and skipped; the tick
/// never aborts partway through.
pub async fn run_once(sender: &dyn ChatSender, now_utc: chrono::DateTime<Utc>) -> TickReport {
    let mut report = TickReport::default();

    let mut reach = load_reach_schedules();
    let mut reach_changed = false;
    let mut keep = Vec::with_capacity(reach.schedules.len());
    for schedule in reach.schedules.drain(..) {
        let due = match reach_schedule_due(&schedule, now_utc) {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(id = %schedule.id, error = %e, "reach schedule skipped: invalid definition");
                keep.push(schedule);
                continue;
            }
        };
        if !due {
            keep.push(schedule);
            continue;
        }
        if !sender.send(&schedule.channel, &schedule.message).await {
            tracing::warn!(id = %schedule.id, "chat send failed, leaving schedule for next tick");
            keep.push(schedule);
            continue;
        }
        report.reach_fired.push(schedule.id);
        reach_changed = true;
        if schedule.is_one_shot() {
            continue; // one-shots are removed once fired
        }
        // Daily reach schedules carry no `next_run` field (unlike
        // `NotificationEntry`): due-now is recomputed from `time` every
        // tick, which is itself idempotent at minute granularity since the
        // default 90s tick interval visits each minute at most once.
        keep.push(schedule);
    }
    reach.schedules = keep;
    if reach_changed {
        if let Err(e) = save_reach_schedules(&reach) {
            tracing::error!(error = %e, "failed to persist reach schedule store");
        }
    }

    let mut notifications = load_notifications();
    let mut notifications_changed = false;
    let mut keep = Vec::with_capacity(notifications.notifications.len());
    for mut entry in notifications.notifications.drain(..) {
        let due = match notification_due(&mut entry, now_utc) {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(id = %entry.id, error = %e, "notification entry skipped: invalid definition");
                keep.push(entry);
                continue;
            }
        };
        if due {
            if sender.send(&entry.target, &entry.message).await {
                report.notifications_fired.push(entry.id);
                notifications_changed = true;
                match entry.schedule_type {
                    NotificationScheduleType::Once => continue, // removed after firing
                    NotificationScheduleType::Daily => {
                        if let Err(e) = advance_daily_next_run(&mut entry, now_utc) {
                            tracing::warn!(id = %entry.id, error = %e, "failed to advance daily notification");
                        }
                    }
                }
            } else {
                tracing::warn!(id = %entry.id, "chat send failed, leaving notification for next tick");
            }
        } else {
            notifications_changed = true; // next_run may have just been materialized
        }
        keep.push(entry);
    }
    notifications.notifications = keep;
    if notifications_changed {
        if let Err(e) = save_notifications(&notifications) {
            tracing::error!(error = %e, "failed to persist notification store");
        }
    }

    report
}

/// Drive [`run_once`] forever on a fixed interval. Intended to be
/// `tokio::spawn`ed once at process start; cancellation is via dropping the
/// returned `JoinHandle` or an external `select!` against a shutdown signal.
pub async fn run_forever(sender: Arc<dyn ChatSender>, interval: Duration) -> ! {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let report = run_once(sender.as_ref(), Utc::now()).await;
        if !report.reach_fired.is_empty() || !report.notifications_fired.is_empty() {
            tracing::info!(
                reach = report.reach_fired.len(),
                notifications = report.notifications_fired.len(),
                "scheduler tick fired entries"
            );
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationEntry, NotificationStore, ReachSchedule, ReachScheduleStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSender(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send(&self, target: &str, message: &str) -> bool {
            self.0.lock().unwrap().push((target.to_string(), message.to_string()));
            true
        }
    }

    struct FailingSender;

    #[async_trait]
    impl ChatSender for FailingSender {
        async fn send(&self, _target: &str, _message: &str) -> bool {
            false
        }
    }

    /// sven-memory's paths resolve against `dirs::home_dir()`; point it at
    /// a scratch directory so tests never touch the real home.
    fn isolate_home() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());
        dir
    }

    #[tokio::test]
    async fn one_shot_reach_schedule_fires_once_then_is_removed() {
        let _home = isolate_home();
        let schedule = ReachSchedule::once_at(
            (Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(),
            "ping".into(),
            "telegram".into(),
        );
        let id = schedule.id;
        save_reach_schedules(&ReachScheduleStore { schedules: vec![schedule] }).unwrap();

        let sender = RecordingSender(Mutex::new(Vec::new()));
        let report = run_once(&sender, Utc::now()).await;
        assert_eq!(report.reach_fired, vec![id]);
        assert_eq!(sender.0.lock().unwrap().len(), 1);

        let after = load_reach_schedules();
        assert!(after.schedules.is_empty());

        let report2 = run_once(&sender, Utc::now()).await;
        assert!(report2.reach_fired.is_empty());
    }

    #[tokio::test]
    async fn failed_send_leaves_one_shot_for_next_tick() {
        let _home = isolate_home();
        let schedule = ReachSchedule::once_at(
            (Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(),
            "ping".into(),
            "telegram".into(),
        );
        save_reach_schedules(&ReachScheduleStore { schedules: vec![schedule] }).unwrap();

        let report = run_once(&FailingSender, Utc::now()).await;
        assert!(report.reach_fired.is_empty());
        let after = load_reach_schedules();
        assert_eq!(after.schedules.len(), 1);
    }

    #[tokio::test]
    async fn daily_notification_materializes_and_fires_at_hhmm() {
        let _home = isolate_home();
        let now = Utc::now();
        let hhmm = now.format("%H:%M").to_string();
        let entry = NotificationEntry {
            id: uuid::Uuid::new_v4(),
            schedule_type: NotificationScheduleType::Daily,
            message: "good morning".into(),
            target: "all".into(),
            enabled: true,
            time: Some(hhmm),
            once_at: None,
            last_run: None,
            next_run: None,
            timezone: None,
        };
        save_notifications(&NotificationStore { notifications: vec![entry] }).unwrap();

        let sender = RecordingSender(Mutex::new(Vec::new()));
        let report = run_once(&sender, now).await;
        assert_eq!(report.notifications_fired.len(), 1);

        let after = load_notifications();
        let entry = &after.notifications[0];
        assert!(entry.next_run.is_some());
        assert!(entry.last_run.is_some());
    }

    #[tokio::test]
    async fn disabled_reach_schedule_never_fires() {
        let _home = isolate_home();
        let mut schedule = ReachSchedule::once_at(
            (Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(),
            "ping".into(),
            "telegram".into(),
        );
        schedule.enabled = false;
        save_reach_schedules(&ReachScheduleStore { schedules: vec![schedule] }).unwrap();

        let sender = RecordingSender(Mutex::new(Vec::new()));
        let report = run_once(&sender, Utc::now()).await;
        assert!(report.reach_fired.is_empty());
        assert_eq!(load_reach_schedules().schedules.len(), 1);
    }
}
