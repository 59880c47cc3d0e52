// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Orchestrates the Context Assembler's full sequence: memory flush, then
//! summarization, then context selection — all driven off the same history
//! and metadata the caller loaded from disk.
use std::path::Path;

use sven_config::EnhancedConfig;

use crate::assembler::{self, SelectedContext};
use crate::history::{HistoryEntry, HistoryMeta};
use crate::memory_flush::run_memory_flush;
use crate::summarizer::summarize_history;
use crate::tokens::estimate_tokens;

const DEFAULT_MAX_TOKENS: i64 = 100_000;
const DEFAULT_SOFT_THRESHOLD: i64 = 20_000;
const DEFAULT_RESERVE_FLOOR: i64 = 1000;

pub struct PreparedContext {
    pub selected: SelectedContext,
    pub history: Vec<HistoryEntry>,
    pub meta: HistoryMeta,
    pub summarized: bool,
    pub memory_flushed: bool,
}

/// Run the full pipeline for one request: maybe flush memory, maybe
/// summarize, then select. `history_limit` mirrors the CLI's
/// `--history-limit` flag (`None` ⇒ token-budgeted).
pub async fn prepare(
    mut history: Vec<HistoryEntry>,
    mut meta: HistoryMeta,
    config: &EnhancedConfig,
    binary: Option<&Path>,
    workspace_dir: &Path,
    system_prompt: &str,
    user_request: &str,
    history_limit: Option<usize>,
    max_tokens: i64,
) -> PreparedContext {
    let system_tokens = estimate_tokens(system_prompt) as i64;
    let user_tokens = estimate_tokens(user_request) as i64;

    let mut summarized = false;
    let mut memory_flushed = false;

    if assembler::needs_summarization(&history, max_tokens, system_tokens, user_tokens) {
        let rendered_tokens =
            estimate_tokens(&assembler::format_history_for_prompt(&history)) as i64;
        if let Some(bin) = binary {
            if assembler::needs_memory_flush(
                rendered_tokens,
                max_tokens,
                DEFAULT_RESERVE_FLOOR,
                DEFAULT_SOFT_THRESHOLD,
                meta.compaction_count,
                meta.memory_flush_compaction_count,
            ) {
                let today = chrono::Utc::now().date_naive();
                memory_flushed = run_memory_flush(&history, bin, workspace_dir, today).await;
                if memory_flushed {
                    meta.memory_flush_compaction_count = Some(meta.compaction_count + 1);
                }
            }

            let outcome = summarize_history(&history, bin, Vec::new(), false).await;
            if outcome.summarized {
                history = outcome.history;
                meta.compaction_count += 1;
                summarized = true;
            }
        }
    }

    let selected = match history_limit {
        Some(limit) => {
            assembler::select_fixed_count(&history, limit, max_tokens, system_tokens, user_tokens)
        }
        None => assembler::select_token_budgeted(&history, max_tokens, system_tokens, user_tokens),
    };

    PreparedContext { selected, history, meta, summarized, memory_flushed }
}

pub fn default_max_tokens() -> i64 {
    DEFAULT_MAX_TOKENS
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
