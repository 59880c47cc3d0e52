// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Scheduler Core: reach schedules (one-shot/daily/cron) and scheduled
//! notifications, both evaluated by the same tick and fired through the
//! chat front-end's [`notify::ChatSender`] seam.
pub mod due;
pub mod error;
pub mod model;
pub mod notify;
pub mod store;
pub mod tick;

pub use due::{daily_schedule_next_run, next_daily_occurrence, notification_due, parse_timezone, reach_schedule_due};
pub use error::Error;
pub use model::{
    NotificationEntry, NotificationScheduleType, NotificationStore, ReachSchedule, ReachScheduleStore, Trigger,
};
pub use notify::{ChatSender, NullSender};
pub use tick::{run_forever, run_once, TickReport, DEFAULT_INTERVAL_SECS};
