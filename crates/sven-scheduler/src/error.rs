// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),
    #[error("schedule invariant violated: exactly one of time|cron|once_at must be set")]
    AmbiguousTrigger,
}
