// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Telegram transport: a thin `teloxide` adapter over [`ChatTransport`], and
//! the long-polling loop that feeds every inbound message through
//! [`route`]. Built only with the `telegram` feature so the core crate
//! stays transport-agnostic.
use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::format;
use crate::pairing;
use crate::routing::{route, ChatContext, RouteOutcome};
use crate::transport::ChatTransport;

pub struct TeloxideTransport(pub Bot);

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_html(&self, chat_id: &str, html: &str) -> bool {
        let Ok(raw) = chat_id.parse::<i64>() else {
            return false;
        };
        self.0
            .send_message(ChatId(raw), html)
            .parse_mode(ParseMode::Html)
            .await
            .is_ok()
    }
}

/// Run the Telegram bot with long polling. Every inbound text message is
/// routed through [`route`] and the reply sent back in chunks. Blocks
/// forever; intended to be awaited directly from `main`.
pub async fn run(bot_token: String, ctx: Arc<ChatContext>) {
    let bot = Bot::new(bot_token);
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let ctx = ctx.clone();
        async move {
            let Some(text) = msg.text() else {
                return Ok(());
            };
            let chat_id = msg.chat.id.0;
            let user_id = msg.from.as_ref().map(|u| u.id.0.to_string()).unwrap_or_default();

            let outcome = route(&ctx, chat_id, &user_id, text).await;
            let body = match outcome {
                RouteOutcome::Reply(text) | RouteOutcome::Acknowledged(text) => text,
            };

            let html = format::render_html_or_plain(&body);
            for chunk in format::chunk_message(&html) {
                if let Err(e) = bot.send_message(msg.chat.id, chunk).parse_mode(ParseMode::Html).await {
                    tracing::warn!(error = %e, "failed to deliver telegram reply chunk");
                }
            }
            respond(())
        }
    })
    .await;
}

/// Delivers detached-run completion messages through the same bot the
/// long-poll loop above drives. Built from a fresh [`Bot`] rather than the
/// one `run` owns since the two are constructed before `run` is entered.
pub struct TelegramNotifier(Bot);

impl TelegramNotifier {
    pub fn new(bot_token: String) -> Self {
        Self(Bot::new(bot_token))
    }
}

#[async_trait]
impl sven_team::detached::ChatNotifier for TelegramNotifier {
    async fn notify(&self, chat_id: &str, message: &str) {
        let Ok(raw) = chat_id.parse::<i64>() else {
            tracing::warn!(chat_id, "detached run completion has no numeric chat id to notify");
            return;
        };
        let html = format::render_html_or_plain(message);
        for chunk in format::chunk_message(&html) {
            if let Err(e) = self.0.send_message(ChatId(raw), chunk).parse_mode(ParseMode::Html).await {
                tracing::warn!(error = %e, "failed to deliver detached-run completion");
            }
        }
    }
}

/// Delivers scheduler fires (reach schedules and recurring notifications)
/// through Telegram. `target == "all"` broadcasts to every paired chat;
/// anything else is parsed as a single chat id.
pub struct TelegramChatSender(Bot);

impl TelegramChatSender {
    pub fn new(bot_token: String) -> Self {
        Self(Bot::new(bot_token))
    }

    async fn send_one(&self, chat_id: i64, message: &str) -> bool {
        let html = format::render_html_or_plain(message);
        let mut ok = true;
        for chunk in format::chunk_message(&html) {
            if let Err(e) = self.0.send_message(ChatId(chat_id), chunk).parse_mode(ParseMode::Html).await {
                tracing::warn!(error = %e, "failed to deliver scheduled message");
                ok = false;
            }
        }
        ok
    }
}

#[async_trait]
impl sven_scheduler::ChatSender for TelegramChatSender {
    async fn send(&self, target: &str, message: &str) -> bool {
        if target == "all" {
            let state = pairing::load();
            let mut all_ok = true;
            for chat_id in &state.paired_users {
                all_ok &= self.send_one(*chat_id, message).await;
            }
            return all_ok;
        }
        let Ok(chat_id) = target.parse::<i64>() else {
            tracing::warn!(target, "scheduler fire has no numeric chat id to deliver to");
            return false;
        };
        self.send_one(chat_id, message).await
    }
}
