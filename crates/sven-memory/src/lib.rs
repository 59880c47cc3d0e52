// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Context Assembler, Summarizer, and Memory Flush for the orchestration
//! layer, plus full-text search over the memory workspace.
pub mod assembler;
pub mod history;
pub mod memory_flush;
pub mod paths;
pub mod pipeline;
pub mod search;
pub mod summarizer;
pub mod tokens;

pub use assembler::{format_history_for_prompt, select_fixed_count, select_token_budgeted, SelectedContext};
pub use history::{sanitize_session_name, HistoryEntry, HistoryMeta};
pub use pipeline::{prepare, PreparedContext};
pub use search::{search as memory_search, MemorySearchHit};
