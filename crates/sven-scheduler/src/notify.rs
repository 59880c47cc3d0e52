// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Narrow seam the chat front-end implements so the scheduler can dispatch
//! a fired message without depending on the transport stack, mirroring
//! `sven_team::detached::ChatNotifier`.
use async_trait::async_trait;

#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Send `message` to a specific chat id, or broadcast to every paired
    /// user when `target == "all"`. Returns `true` on success; a `false`
    /// result is logged and the entry is left for the next tick rather than
    /// raised as an error, per the at-least-once delivery non-goal.
    async fn send(&self, target: &str, message: &str) -> bool;
}

/// A sender used when no chat transport is configured (e.g. CLI-only
/// operation); every fire is logged and reported as delivered so one-shot
/// and daily bookkeeping still advances.
pub struct NullSender;

#[async_trait]
impl ChatSender for NullSender {
    async fn send(&self, target: &str, message: &str) -> bool {
        tracing::info!(target, message, "scheduler fired with no chat transport configured");
        true
    }
}
