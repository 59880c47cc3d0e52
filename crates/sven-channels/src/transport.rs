// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The chat transport seam: a single `send` primitive every concrete
//! backend (Telegram via `teloxide`, or any future one) implements, plus
//! the adapters that let [`sven_team::detached::ChatNotifier`] and
//! [`sven_scheduler::notify::ChatSender`] dispatch through it without those
//! crates depending on this one.
use std::sync::Arc;

use async_trait::async_trait;

use crate::pairing::PairingState;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send pre-rendered HTML to a specific chat id. Returns `true` on
    /// success. HTTP/network failures are caught and reported as `false`
    /// rather than propagated, per the transport-failure error kind.
    async fn send_html(&self, chat_id: &str, html: &str) -> bool;
}

/// A transport used in tests and CLI-only operation: records sends instead
/// of performing any I/O.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_html(&self, chat_id: &str, html: &str) -> bool {
        self.sent.lock().unwrap().push((chat_id.to_string(), html.to_string()));
        true
    }
}

/// Renders then chunks a message before handing each chunk to the
/// transport, falling back to plain text if the rendered HTML is
/// unbalanced; all chunks must send successfully for the overall send to
/// count as a success.
pub async fn send_message(transport: &dyn ChatTransport, chat_id: &str, text: &str) -> bool {
    let rendered = crate::format::render_html_or_plain(text);
    let mut ok = true;
    for chunk in crate::format::chunk_message(&rendered) {
        ok &= transport.send_html(chat_id, &chunk).await;
    }
    ok
}

/// Broadcasts to every paired chat id, loading the pairing store fresh so
/// concurrent approvals are picked up.
pub async fn broadcast(transport: &dyn ChatTransport, text: &str) -> bool {
    let state = crate::pairing::load();
    broadcast_to(transport, &state, text).await
}

async fn broadcast_to(transport: &dyn ChatTransport, state: &PairingState, text: &str) -> bool {
    let mut all_ok = true;
    for chat_id in &state.paired_users {
        all_ok &= send_message(transport, &chat_id.to_string(), text).await;
    }
    all_ok
}

/// Adapts a [`ChatTransport`] to the narrow notifier seam `sven-team`'s
/// Detached runner expects.
pub struct DetachedNotifier(pub Arc<dyn ChatTransport>);

#[async_trait]
impl sven_team::detached::ChatNotifier for DetachedNotifier {
    async fn notify(&self, chat_id: &str, message: &str) {
        send_message(self.0.as_ref(), chat_id, message).await;
    }
}

/// Adapts a [`ChatTransport`] to the scheduler's `ChatSender` seam,
/// resolving the special `"all"` target to a broadcast over paired chats.
pub struct SchedulerSender(pub Arc<dyn ChatTransport>);

#[async_trait]
impl sven_scheduler::ChatSender for SchedulerSender {
    async fn send(&self, target: &str, message: &str) -> bool {
        if target.eq_ignore_ascii_case("all") {
            broadcast(self.0.as_ref(), message).await
        } else {
            send_message(self.0.as_ref(), target, message).await
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_message_chunks_and_sends_all_parts() {
        let transport = RecordingTransport::default();
        let long = "x".repeat(9000);
        let ok = send_message(&transport, "chat1", &long).await;
        assert!(ok);
        assert!(transport.sent.lock().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn broadcast_targets_every_paired_chat() {
        let transport = RecordingTransport::default();
        let mut state = PairingState::default();
        state.paired_users.insert(1);
        state.paired_users.insert(2);
        broadcast_to(&transport, &state, "hi").await;
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn scheduler_sender_resolves_all_target_to_broadcast() {
        use sven_scheduler::ChatSender;
        let transport = Arc::new(RecordingTransport::default());
        let sender = SchedulerSender(transport.clone());
        // No paired users yet: broadcast to an empty set still reports success.
        assert!(sender.send("all", "hi").await);
    }

    #[tokio::test]
    async fn scheduler_sender_passes_through_specific_chat_target() {
        use sven_scheduler::ChatSender;
        let transport = Arc::new(RecordingTransport::default());
        let sender = SchedulerSender(transport.clone());
        assert!(sender.send("42", "hi").await);
        assert_eq!(transport.sent.lock().unwrap()[0].0, "42");
    }
}
