// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Advisory pre-compaction step: asks the child agent to write durable
//! facts and a daily note from the older half of the history. Never raises;
//! a failure here must not block the main request.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sven_config::{invoke_child_agent, ChildAgentOutput};

use crate::assembler::format_history_for_prompt;
use crate::history::HistoryEntry;

pub const MEMORY_FLUSH_TIMEOUT: Duration = Duration::from_secs(180);
pub const NO_REPLY: &str = "NO_REPLY";

const SYSTEM_PROMPT: &str = "You are a memory-keeping assistant. Write durable facts the user \
    would want remembered across sessions to a canonical memory file, and write a brief daily \
    note summarizing what happened today.";

const USER_PROMPT: &str = "Given the conversation history below, return ONLY one of the \
    following:\n- NO_REPLY\n- A single JSON object with keys \"memory\" and \"daily\" \
    containing markdown. If a key has no content, use an empty string.\n\nConversation history:\n";

#[derive(Debug, Deserialize)]
struct FlushPayload {
    #[serde(default)]
    memory: String,
    #[serde(default)]
    daily: String,
}

/// Parse the child agent's stdout as either the `NO_REPLY` sentinel or a
/// JSON object, tolerating surrounding prose by extracting the first
/// top-level `{...}` span.
fn parse_flush_output(output: &str) -> Option<FlushPayload> {
    let trimmed = output.trim();
    if trimmed.split_whitespace().any(|w| w == NO_REPLY) {
        return None;
    }
    if let Ok(payload) = serde_json::from_str::<FlushPayload>(trimmed) {
        return Some(payload);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<FlushPayload>(&trimmed[start..=end]).ok()
}

fn append_entry(path: &Path, content: &str) -> std::io::Result<bool> {
    let content = content.trim();
    if content.is_empty() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let needs_spacing = path.exists() && path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    if needs_spacing {
        f.write_all(b"\n\n")?;
    }
    f.write_all(content.as_bytes())?;
    f.write_all(b"\n")?;
    Ok(true)
}

/// Run the memory flush against the older half of `history`, writing to
/// `workspace_dir/MEMORY.md` and `workspace_dir/memory/<date>.md`. Returns
/// `true` if the child agent ran successfully (even if it emitted
/// `NO_REPLY` or wrote nothing); `false` only on subprocess/parse failure.
pub async fn run_memory_flush(
    history: &[HistoryEntry],
    binary: &Path,
    workspace_dir: &Path,
    today: chrono::NaiveDate,
) -> bool {
    if history.is_empty() {
        return false;
    }
    let split_idx = (history.len() / 2).max(1);
    let flush_messages = &history[..split_idx.min(history.len())];
    let formatted = format_history_for_prompt(flush_messages);
    let prompt = format!("{SYSTEM_PROMPT}\n\n{USER_PROMPT}{formatted}");

    let args = vec!["--force".to_string(), "-p".to_string(), prompt];
    let output = invoke_child_agent(binary, &args, &HashMap::new(), MEMORY_FLUSH_TIMEOUT).await;

    match output {
        Ok(ChildAgentOutput { exit_code: Some(0), stdout, .. }) => {
            let Some(payload) = parse_flush_output(&stdout) else {
                return stdout.trim().split_whitespace().any(|w| w == NO_REPLY);
            };
            let memory_file: PathBuf = workspace_dir.join("MEMORY.md");
            let daily_file: PathBuf = workspace_dir
                .join("memory")
                .join(format!("{}.md", today.format("%Y-%m-%d")));
            let _ = append_entry(&memory_file, &payload.memory);
            let _ = append_entry(&daily_file, &payload.daily);
            true
        }
        _ => false,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
