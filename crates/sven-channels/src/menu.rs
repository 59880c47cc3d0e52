// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The chat front-end's command menu: a small, user-configurable table of
//! `{label, command}` entries surfaced via `/menu`, seeded with the
//! built-in commands every pairing understands.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub label: String,
    pub command: String,
}

impl MenuItem {
    fn new(label: &str, command: &str) -> Self {
        Self { label: label.to_string(), command: command.to_string() }
    }
}

/// Built-in commands always available regardless of config.
pub fn default_menu_items() -> Vec<MenuItem> {
    vec![
        MenuItem::new("Start", "/start"),
        MenuItem::new("Help", "/help"),
        MenuItem::new("Status", "/status"),
        MenuItem::new("Menu", "/menu"),
        MenuItem::new("Recent reports", "/reports"),
    ]
}

/// Render the `/menu` command body, appending any user-configured extra
/// items after the built-ins, in the order supplied.
pub fn render_menu(extra_items: &[MenuItem]) -> String {
    let mut out = String::from("**Menu:**\n\n");
    for item in default_menu_items().iter().chain(extra_items) {
        out.push_str(&format!("- {} — `{}`\n", item.label, item.command));
    }
    out
}

pub const HELP_TEXT: &str = "\
Send any message to talk to the agent.

Commands:
/start — pair this chat
/help — show this help
/status — show sub-agent execution status
/menu — show the command menu
/reports — list recent detached runs

Prefixes:
`new <task>` — start a fresh-context agent, returns a code
`/re <code> <message>` — continue a new-thread agent by code
`detached: <task>` — run in the background, notified on completion";

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_menu_has_five_built_ins() {
        assert_eq!(default_menu_items().len(), 5);
    }

    #[test]
    fn render_menu_includes_built_ins_and_extras() {
        let extra = vec![MenuItem::new("Custom", "/custom")];
        let out = render_menu(&extra);
        assert!(out.contains("/start"));
        assert!(out.contains("/custom"));
    }

    #[test]
    fn render_menu_with_no_extras_still_lists_built_ins() {
        let out = render_menu(&[]);
        assert!(out.contains("/reports"));
    }
}
