// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Chat front-end session state: pairing, output rendering, per-chat
//! "new-thread" agent routing, and the built-in command surface
//! (`/start`, `/help`, `/status`, `/menu`, `/reports`). The concrete
//! transport (Telegram via `teloxide`, behind the `telegram` feature) lives
//! outside this crate's test-covered core; [`transport::ChatTransport`] is
//! the seam it plugs into.
pub mod format;
pub mod menu;
pub mod new_thread;
pub mod pairing;
pub mod reports;
pub mod routing;
#[cfg(feature = "telegram")]
pub mod telegram;
pub mod transport;

pub use format::{chunk_message, render_html, render_html_or_plain};
pub use menu::{default_menu_items, render_menu, MenuItem, HELP_TEXT};
pub use new_thread::{AgentStatus, NewThreadAgent, NewThreadAgentStore};
pub use pairing::PairingState;
pub use reports::{recent_detached_reports, render_reports, render_status};
pub use routing::{route, run_main_stream, ChatContext, RouteOutcome};
pub use transport::{broadcast, send_message, ChatTransport, DetachedNotifier, RecordingTransport, SchedulerSender};
