// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Token-budgeted history selection: picks as many recent messages as
//! possible while staying under the context budget, always trying to
//! preserve a leading summary entry if present.
use crate::history::HistoryEntry;
use crate::tokens::estimate_tokens;

const RESERVE_FLOOR: i64 = 1000;

/// Render a single entry the way it would appear inside the prompt.
pub fn format_entry(entry: &HistoryEntry) -> String {
    let role_label = role_label(&entry.role);
    format!("{role_label}: {}\n\n", entry.content)
}

fn role_label(role: &str) -> &'static str {
    match role {
        "system" => "SYSTEM SUMMARY",
        "user" => "User",
        _ => "Agent",
    }
}

/// Render a full history block with header/footer delimiters, used as the
/// context block embedded in the outgoing prompt.
pub fn format_history_for_prompt(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("=== START OF CONVERSATION HISTORY ===\n");
    for entry in history {
        out.push_str(&format_entry(entry));
    }
    out.push_str("=== END OF CONVERSATION HISTORY ===\n\n");
    out
}

/// Result of a context-selection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedContext {
    pub entries: Vec<HistoryEntry>,
    pub tokens: usize,
}

/// Select the most recent entries from `history` that fit within
/// `max_tokens - system_prompt_tokens - user_prompt_tokens - RESERVE_FLOOR`.
/// If `history[0]` is a `system`-role summary entry, it is included first
/// whenever it fits; entries are then added from newest to oldest until the
/// next one would overflow the remaining budget, and the result is restored
/// to chronological order.
pub fn select_token_budgeted(
    history: &[HistoryEntry],
    max_tokens: i64,
    system_prompt_tokens: i64,
    user_prompt_tokens: i64,
) -> SelectedContext {
    if history.is_empty() {
        return SelectedContext { entries: Vec::new(), tokens: 0 };
    }

    let available = max_tokens - system_prompt_tokens - user_prompt_tokens - RESERVE_FLOOR;
    if available <= 0 {
        return SelectedContext { entries: Vec::new(), tokens: 0 };
    }
    let available = available as usize;

    let (summary, rest) = match history.first() {
        Some(e) if e.role == "system" => (Some(e.clone()), &history[1..]),
        _ => (None, history),
    };

    let mut selected = Vec::new();
    let mut current_tokens: usize = 0;

    if let Some(summary_entry) = &summary {
        let summary_tokens = estimate_tokens(&format_entry(summary_entry));
        // Summary uses a strict `<` against the full budget: an entry that
        // consumes the entire budget is dropped rather than starved.
        if summary_tokens < available {
            selected.push(summary_entry.clone());
            current_tokens += summary_tokens;
        }
    }

    let mut picked_recent = Vec::new();
    for entry in rest.iter().rev() {
        let entry_tokens = estimate_tokens(&format_entry(entry));
        // Message accumulation uses `<=`: a message that exactly fills the
        // remaining budget is still included.
        if current_tokens + entry_tokens <= available {
            picked_recent.push(entry.clone());
            current_tokens += entry_tokens;
        } else {
            break;
        }
    }
    picked_recent.reverse();
    selected.extend(picked_recent);

    SelectedContext { entries: selected, tokens: current_tokens }
}

/// Fixed message-count selection: the caller passed an explicit
/// `--history-limit`. Still falls through to the token-budgeted path when
/// the fixed window's rendered text would overflow the budget.
pub fn select_fixed_count(
    history: &[HistoryEntry],
    limit: usize,
    max_tokens: i64,
    system_prompt_tokens: i64,
    user_prompt_tokens: i64,
) -> SelectedContext {
    let start = history.len().saturating_sub(limit);
    let window = &history[start..];
    let rendered = format_history_for_prompt(window);
    let available = max_tokens - system_prompt_tokens - user_prompt_tokens - RESERVE_FLOOR;
    if available > 0 && estimate_tokens(&rendered) as i64 <= available {
        SelectedContext {
            tokens: estimate_tokens(&rendered),
            entries: window.to_vec(),
        }
    } else {
        select_token_budgeted(history, max_tokens, system_prompt_tokens, user_prompt_tokens)
    }
}

/// `true` if the full rendered history plus system/user prompts would
/// overflow `max_tokens`, meaning the Summarizer should run before
/// selection is attempted again.
pub fn needs_summarization(
    history: &[HistoryEntry],
    max_tokens: i64,
    system_prompt_tokens: i64,
    user_prompt_tokens: i64,
) -> bool {
    let total = system_prompt_tokens
        + estimate_tokens(&format_history_for_prompt(history)) as i64
        + user_prompt_tokens;
    total > max_tokens
}

/// `true` if Memory Flush should run before the next summarization: the
/// running total is within `soft_threshold` of the `reserve_floor`, and the
/// upcoming compaction generation has not already been flushed.
pub fn needs_memory_flush(
    total_tokens: i64,
    max_tokens: i64,
    reserve_floor: i64,
    soft_threshold: i64,
    compaction_count: u64,
    memory_flush_compaction_count: Option<u64>,
) -> bool {
    if total_tokens <= 0 {
        return false;
    }
    let threshold = (max_tokens - reserve_floor - soft_threshold).max(0);
    if threshold <= 0 || total_tokens < threshold {
        return false;
    }
    let next_compaction = compaction_count + 1;
    memory_flush_compaction_count != Some(next_compaction)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize, chars: usize) -> Vec<HistoryEntry> {
        let mut v = Vec::new();
        for i in 0..n {
            let role = if i % 2 == 0 { "user" } else { "agent" };
            let content = "x".repeat(chars);
            v.push(HistoryEntry { role: role.into(), content, timestamp_ms: None });
        }
        v
    }

    #[test]
    fn empty_history_selects_nothing() {
        let sel = select_token_budgeted(&[], 100_000, 0, 3);
        assert!(sel.entries.is_empty());
    }

    #[test]
    fn non_positive_available_selects_nothing() {
        let h = entries(5, 200);
        let sel = select_token_budgeted(&h, 100, 0, 1000);
        assert!(sel.entries.is_empty());
    }

    #[test]
    fn selection_never_exceeds_budget() {
        let h = entries(100, 200);
        let budget = 100_000i64;
        let sel = select_token_budgeted(&h, budget, 0, 3);
        let available = budget - 0 - 3 - 1000;
        assert!(sel.tokens as i64 <= available);
    }

    #[test]
    fn selection_picks_most_recent_messages_first() {
        let mut h = entries(10, 50);
        // Mark last entry distinctly
        h.last_mut().unwrap().content = "LAST".into();
        let sel = select_token_budgeted(&h, 100_000, 0, 3);
        assert_eq!(sel.entries.last().unwrap().content, "LAST");
    }

    #[test]
    fn summary_head_preserved_when_present() {
        let mut h = vec![HistoryEntry::summary("old stuff")];
        h.extend(entries(3, 50));
        let sel = select_token_budgeted(&h, 100_000, 0, 3);
        assert_eq!(sel.entries[0].role, "system");
    }

    #[test]
    fn oversized_summary_is_dropped_not_truncated() {
        let mut h = vec![HistoryEntry::summary(&"y".repeat(1_000_000))];
        h.extend(entries(2, 10));
        let sel = select_token_budgeted(&h, 1000, 0, 0);
        assert!(sel.entries.iter().all(|e| e.role != "system"));
    }

    #[test]
    fn selected_context_starts_with_summary_or_is_empty() {
        let h = entries(5, 200);
        let sel = select_token_budgeted(&h, 100_000, 0, 3);
        assert!(sel.entries.is_empty() || sel.entries[0].role != "system");
    }

    #[test]
    fn fixed_count_falls_through_to_token_budget_when_overflowing() {
        let h = entries(50, 2_000_000);
        let sel = select_fixed_count(&h, 10, 1000, 0, 0);
        assert!(sel.entries.len() < 10);
    }

    #[test]
    fn needs_summarization_true_when_overflowing() {
        let h = entries(1000, 500);
        assert!(needs_summarization(&h, 1000, 0, 0));
    }

    #[test]
    fn needs_summarization_false_for_small_history() {
        let h = entries(1, 10);
        assert!(!needs_summarization(&h, 100_000, 0, 0));
    }

    #[test]
    fn needs_memory_flush_respects_already_flushed_generation() {
        let flushed = needs_memory_flush(90_000, 100_000, 1000, 2000, 0, Some(1));
        assert!(!flushed);
        let not_flushed = needs_memory_flush(90_000, 100_000, 1000, 2000, 0, None);
        assert!(not_flushed);
    }

    #[test]
    fn needs_memory_flush_false_below_threshold() {
        assert!(!needs_memory_flush(100, 100_000, 1000, 2000, 0, None));
    }
}
