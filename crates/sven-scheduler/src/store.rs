// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Load/save helpers for the two independent schedule stores, routed
//! through the shared atomic-write-with-lock store used by every other
//! piece of persisted state in this system.
use sven_config::store::StoreError;
use sven_memory::paths::{reach_schedules_path, scheduled_notifications_path};

use crate::model::{NotificationStore, ReachScheduleStore};

pub fn load_reach_schedules() -> ReachScheduleStore {
    sven_config::store::load(&reach_schedules_path())
}

pub fn save_reach_schedules(store: &ReachScheduleStore) -> Result<(), StoreError> {
    sven_config::store::save(&reach_schedules_path(), store)
}

pub fn load_notifications() -> NotificationStore {
    sven_config::store::load(&scheduled_notifications_path())
}

pub fn save_notifications(store: &NotificationStore) -> Result<(), StoreError> {
    sven_config::store::save(&scheduled_notifications_path(), store)
}
