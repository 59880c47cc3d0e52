// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Persisted state layout under the user home directory, shared by every
//! store in the system so on-disk paths stay in one place.
use std::path::PathBuf;

pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn enhanced_dir() -> PathBuf {
    home_dir().join(".cursor-enhanced")
}

pub fn workspace_dir() -> PathBuf {
    enhanced_dir().join("workspace")
}

pub fn sessions_path() -> PathBuf {
    enhanced_dir().join("sessions.json")
}

pub fn telegram_pairings_path() -> PathBuf {
    enhanced_dir().join("telegram-pairings.json")
}

pub fn reach_schedules_path() -> PathBuf {
    enhanced_dir().join("reach-schedules.json")
}

pub fn scheduled_notifications_path() -> PathBuf {
    enhanced_dir().join("scheduled-notifications.json")
}

pub fn new_thread_agents_path() -> PathBuf {
    enhanced_dir().join("new-thread-agents.json")
}

pub fn subagent_tracker_path() -> PathBuf {
    enhanced_dir().join("subagent-tracker-state.json")
}

pub fn detached_reports_dir() -> PathBuf {
    enhanced_dir().join("detached-reports")
}

pub fn detached_report_path(run_id: &str) -> PathBuf {
    detached_reports_dir().join(format!("{run_id}.json"))
}
