// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-message routing for the chat front-end: pairing gate, then the
//! `new `/`/re <code>`/`detached:` prefixes, falling back to the standard
//! serial main stream shared with the CLI front-end.
use std::path::PathBuf;
use std::sync::Arc;

use sven_config::EnhancedConfig;
use sven_memory::{history, paths, HistoryEntry};
use sven_team::detached::DetachedRunner;
use sven_team::Tracker;
use sven_tools::ToolRegistry;

use crate::menu::{self, MenuItem};
use crate::new_thread::{self, NewThreadAgentStore};
use crate::pairing;
use crate::reports;

/// Everything a single chat message needs routed: the shared config, child
/// agent binary, tool registry for the main stream, and detached runner.
pub struct ChatContext {
    pub config: EnhancedConfig,
    pub binary: Option<PathBuf>,
    pub registry: Arc<ToolRegistry>,
    pub detached: Arc<DetachedRunner>,
    /// Shared with [`sven_tools::CursorAgentTool`]/`DelegateTool`/etc. via
    /// [`sven_team::Backends::tracker`]; used here only to render `/status`.
    pub tracker: Arc<Tracker>,
    pub max_tokens: i64,
    /// Extra args appended to every child-agent invocation verbatim (e.g.
    /// the CLI's `--model`/passthrough flags). Empty for chat transports.
    pub extra_args: Vec<String>,
    /// Resolved persona system prompt text, prepended ahead of the
    /// assembled history context. `None` uses the child agent's own default.
    pub system_prompt: Option<String>,
}

/// What happened to a routed message, rendered by the caller via
/// [`crate::format::render_html_or_plain`] before sending.
pub enum RouteOutcome {
    /// Reply immediately with this text (pairing prompts, `/re` lookups,
    /// already-paired chats talking to the main stream).
    Reply(String),
    /// A new-thread agent or detached run was kicked off; reply with an
    /// acknowledgement containing its code/run-id, no further action.
    Acknowledged(String),
}

/// Route one inbound chat message. `chat_id`/`user_id` identify the sender;
/// `text` is the raw message body.
pub async fn route(ctx: &ChatContext, chat_id: i64, user_id: &str, text: &str) -> RouteOutcome {
    let mut state = pairing::load();
    if !state.is_paired(chat_id) {
        let code = state.start_pairing(chat_id);
        if let Err(e) = pairing::save(&state) {
            tracing::error!(error = %e, "failed to persist pairing state");
        }
        return RouteOutcome::Reply(format!(
            "This chat isn't paired yet. Approve it from the CLI with:\n\n  sven --telegram-approve {code}"
        ));
        // start_pairing reissues a fresh code on repeated attempts, so a
        // pending chat can retry the approval flow without getting stuck.
    }

    let trimmed = text.trim();
    let lower = trimmed.to_ascii_lowercase();

    match lower.as_str() {
        "/start" => return RouteOutcome::Reply("Already paired. Send any message to talk to the agent.".to_string()),
        "/help" => return RouteOutcome::Reply(menu::HELP_TEXT.to_string()),
        "/menu" => {
            let extra: Vec<MenuItem> = ctx
                .config
                .telegram
                .menu_items
                .iter()
                .map(|(label, command)| MenuItem { label: label.clone(), command: command.clone() })
                .collect();
            return RouteOutcome::Reply(menu::render_menu(&extra));
        }
        "/status" => return RouteOutcome::Reply(reports::render_status(&ctx.tracker).await),
        "/reports" => return RouteOutcome::Reply(reports::render_reports(&reports::recent_detached_reports())),
        _ => {}
    }

    if lower == "new" || lower.starts_with("new ") {
        let task = trimmed.get(3..).unwrap_or("").trim().to_string();
        return RouteOutcome::Acknowledged(spawn_new_thread(ctx, task, chat_id, user_id).await);
    }

    if let Some(rest) = trimmed.strip_prefix("/re") {
        return handle_re(ctx, rest.trim(), chat_id, user_id).await;
    }

    if let Some(task) = trimmed.strip_prefix("detached:") {
        let run_id = ctx.detached.spawn(task.trim().to_string(), Some(chat_id.to_string()));
        return RouteOutcome::Acknowledged(format!("Started detached run `{run_id}`. You'll be notified here when it finishes."));
    }

    RouteOutcome::Reply(run_main_stream(ctx, &chat_id.to_string(), trimmed).await)
}

async fn spawn_new_thread(ctx: &ChatContext, task: String, chat_id: i64, user_id: &str) -> String {
    let mut store: NewThreadAgentStore = new_thread::load();
    let code = store.allocate(task.clone(), chat_id.to_string(), user_id.to_string());
    if let Err(e) = new_thread::save(&store) {
        tracing::error!(error = %e, "failed to persist new-thread agent store");
    }

    let binary = ctx.binary.clone();
    let config = ctx.config.clone();
    tokio::spawn(async move {
        let response = run_fresh_context(binary.as_deref(), &config, &task).await;
        let mut store = new_thread::load();
        store.complete(code, response);
        if let Err(e) = new_thread::save(&store) {
            tracing::error!(error = %e, "failed to persist new-thread agent completion");
        }
    });

    format!("Started agent #{code}. Follow up any time with `/re {code} <message>`.")
}

async fn handle_re(ctx: &ChatContext, rest: &str, chat_id: i64, user_id: &str) -> RouteOutcome {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let Some(code_str) = parts.next().filter(|s| !s.is_empty()) else {
        return RouteOutcome::Reply("Usage: /re <code> [message]".to_string());
    };
    let Ok(code) = code_str.parse::<i64>() else {
        return RouteOutcome::Reply(format!("`{code_str}` isn't a valid agent code."));
    };

    let body = parts.next().map(str::trim).unwrap_or("");
    if body.is_empty() {
        let store = new_thread::load();
        return match store.get(code) {
            Some(agent) => RouteOutcome::Reply(
                agent.last_response.clone().unwrap_or_else(|| "Agent is still running.".to_string()),
            ),
            None => RouteOutcome::Reply(format!("No agent with code {code}.")),
        };
    }

    {
        let store = new_thread::load();
        if store.get(code).is_none() {
            return RouteOutcome::Reply(format!("No agent with code {code}."));
        }
    }

    let task = body.to_string();
    let binary = ctx.binary.clone();
    let config = ctx.config.clone();
    tokio::spawn(async move {
        let response = run_fresh_context(binary.as_deref(), &config, &task).await;
        let mut store = new_thread::load();
        store.complete(code, response);
        if let Err(e) = new_thread::save(&store) {
            tracing::error!(error = %e, "failed to persist new-thread agent completion");
        }
    });

    let _ = user_id;
    RouteOutcome::Acknowledged(format!("Continuing agent #{code}."))
}

async fn run_fresh_context(binary: Option<&std::path::Path>, config: &EnhancedConfig, task: &str) -> String {
    let Some(binary) = binary else {
        return "No child agent binary configured.".to_string();
    };
    let timeout = std::time::Duration::from_secs(config.delegate.timeout_secs);
    let args = ["--print".to_string(), task.to_string()];
    match sven_config::invoke_child_agent(binary, &args, &Default::default(), timeout).await {
        Ok(out) if out.success() => out.stdout,
        Ok(out) => format!("Agent failed: {}", out.stderr),
        Err(e) => format!("Agent failed: {e}"),
    }
}

/// Run one request through the standard serial main stream: load history,
/// assemble context (flushing/summarizing as needed), spawn the child
/// agent, dispatch any tool calls it asked for, and persist the turn.
///
/// Shared verbatim by every front-end that talks to the child agent
/// synchronously — Telegram's default dispatch and the plain CLI prompt
/// path both call this instead of re-implementing the sequence.
pub async fn run_main_stream(ctx: &ChatContext, session: &str, request: &str) -> String {
    let session = history::sanitize_session_name(session);
    let base_dir = paths::home_dir();
    let history_path = history::history_path(&base_dir, &session);
    let meta_path = history::history_meta_path(&base_dir, &session);

    let loaded_history = history::load_history(&history_path);
    let meta = history::load_meta(&meta_path);

    let prepared = sven_memory::pipeline::prepare(
        loaded_history,
        meta,
        &ctx.config,
        ctx.binary.as_deref(),
        &paths::workspace_dir(),
        "",
        request,
        None,
        ctx.max_tokens,
    )
    .await;

    let context_block = sven_memory::format_history_for_prompt(&prepared.selected.entries);
    let prompt = match &ctx.system_prompt {
        Some(system) => format!("System: {system}\n{context_block}User: {request}\n"),
        None => format!("{context_block}User: {request}\n"),
    };

    let Some(binary) = ctx.binary.clone() else {
        return "No child agent binary configured.".to_string();
    };
    let timeout = std::time::Duration::from_secs(ctx.config.delegate.timeout_secs);
    let mut args = vec!["--print".to_string(), prompt];
    args.extend(ctx.extra_args.iter().cloned());
    let raw_response = match sven_config::invoke_child_agent(&binary, &args, &Default::default(), timeout).await {
        Ok(out) if out.success() => out.stdout,
        Ok(out) => return format!("Agent failed: {}", out.stderr),
        Err(e) => return format!("Agent failed: {e}"),
    };

    let (augmented, _outputs) = sven_tools::dispatch(&raw_response, ctx.registry.as_ref(), Some(request)).await;

    let mut history = prepared.history;
    history.push(HistoryEntry::user(request));
    history.push(HistoryEntry::agent(augmented.clone()));
    if let Err(e) = history::save_history(&history_path, &history) {
        tracing::error!(error = %e, "failed to persist session history");
    }
    if let Err(e) = history::save_meta(&meta_path, &prepared.meta) {
        tracing::error!(error = %e, "failed to persist session history metadata");
    }

    augmented
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
