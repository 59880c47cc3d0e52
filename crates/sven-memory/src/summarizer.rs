// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Splits history at its midpoint and asks the child agent for a dense
//! summary of the older half, replacing it with a single summary entry.
use std::collections::HashMap;
use std::time::Duration;

use sven_config::{invoke_child_agent, ChildAgentOutput};

use crate::assembler::format_history_for_prompt;
use crate::history::HistoryEntry;

pub const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(180);

const SUMMARY_PROMPT_PREFIX: &str =
    "Please provide a comprehensive summary of the following conversation history. \
     Retain all key technical details, code snippets, decisions, and context. \
     The summary should be dense and information-rich to serve as context for \
     future interactions. Do not output anything else but the summary.\n\n";

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeOutcome {
    pub history: Vec<HistoryEntry>,
    pub summarized: bool,
}

/// Summarize the older half of `history`. On a non-zero child-agent exit
/// (or missing binary), the original history is returned untouched and
/// `summarized` is `false`.
pub async fn summarize_history(
    history: &[HistoryEntry],
    binary: &std::path::Path,
    mut extra_args: Vec<String>,
    force: bool,
) -> SummarizeOutcome {
    if history.len() < 2 {
        return SummarizeOutcome { history: history.to_vec(), summarized: false };
    }

    let split_idx = history.len() / 2;
    let (old, recent) = history.split_at(split_idx);
    let prompt = format!("{SUMMARY_PROMPT_PREFIX}{}", format_history_for_prompt(old));

    if force && !extra_args.iter().any(|a| a == "--force" || a == "-f") {
        extra_args.push("--force".to_string());
    }
    let mut args = extra_args;
    args.push("-p".to_string());
    args.push(prompt);

    let output = invoke_child_agent(binary, &args, &HashMap::new(), SUMMARIZE_TIMEOUT).await;

    match output {
        Ok(ChildAgentOutput { exit_code: Some(0), stdout, .. }) => {
            let summary = stdout.trim();
            if summary.is_empty() {
                return SummarizeOutcome { history: history.to_vec(), summarized: false };
            }
            let mut new_history = vec![HistoryEntry::summary(summary)];
            new_history.extend_from_slice(recent);
            SummarizeOutcome { history: new_history, summarized: true }
        }
        _ => SummarizeOutcome { history: history.to_vec(), summarized: false },
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn too_short_history_is_not_summarized() {
        let h = vec![HistoryEntry::user("hi")];
        let out = summarize_history(&h, std::path::Path::new("/bin/true"), vec![], false).await;
        assert!(!out.summarized);
        assert_eq!(out.history, h);
    }

    #[tokio::test]
    async fn nonzero_exit_leaves_history_untouched() {
        let h = vec![HistoryEntry::user("a"), HistoryEntry::agent("b"), HistoryEntry::user("c")];
        let out = summarize_history(&h, std::path::Path::new("/bin/false"), vec![], false).await;
        assert!(!out.summarized);
        assert_eq!(out.history, h);
    }

    #[tokio::test]
    async fn successful_summary_replaces_older_half() {
        // /bin/echo ignores -p and the prompt but exits 0 with a summary-like stdout
        let h = vec![HistoryEntry::user("a"), HistoryEntry::agent("b"), HistoryEntry::user("c"), HistoryEntry::agent("d")];
        let out = summarize_history(&h, std::path::Path::new("/bin/echo"), vec![], true).await;
        assert!(out.summarized);
        assert_eq!(out.history[0].role, "system");
        assert!(out.history[0].content.starts_with("Previous conversation summary:"));
        // Recent half (last 2 of 4) preserved verbatim after the summary entry.
        assert_eq!(out.history.len(), 3);
    }
}
