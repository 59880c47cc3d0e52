// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One turn in a session's conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into(), timestamp_ms: None }
    }
    pub fn agent(content: impl Into<String>) -> Self {
        Self { role: "agent".into(), content: content.into(), timestamp_ms: None }
    }
    pub fn summary(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: format!("Previous conversation summary: {}", content.into()),
            timestamp_ms: None,
        }
    }
}

/// Sidecar metadata tracked per session history file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoryMeta {
    #[serde(default)]
    pub compaction_count: u64,
    /// The compaction generation for which a memory flush has already run,
    /// so a flush is never repeated for the same pending compaction.
    #[serde(default)]
    pub memory_flush_compaction_count: Option<u64>,
}

/// A bare JSON array store: `Vec<HistoryEntry>` round-trips directly without
/// a wrapper object, matching the original's `json.dump(history, f)` shape.
pub fn history_path(base_dir: &Path, session: &str) -> PathBuf {
    if session.is_empty() || session == "default" {
        base_dir.join("cursor-enhanced-history.json")
    } else {
        base_dir.join(format!("cursor-enhanced-history-{session}.json"))
    }
}

pub fn history_meta_path(base_dir: &Path, session: &str) -> PathBuf {
    let dir = base_dir.join(".cursor-enhanced");
    if session.is_empty() || session == "default" {
        dir.join("history-meta.json")
    } else {
        dir.join(format!("history-meta-{session}.json"))
    }
}

pub fn load_history(path: &Path) -> Vec<HistoryEntry> {
    sven_config::store::load(path)
}

pub fn save_history(path: &Path, history: &[HistoryEntry]) -> Result<(), sven_config::store::StoreError> {
    sven_config::store::save(path, &history.to_vec())
}

pub fn load_meta(path: &Path) -> HistoryMeta {
    sven_config::store::load(path)
}

pub fn save_meta(path: &Path, meta: &HistoryMeta) -> Result<(), sven_config::store::StoreError> {
    sven_config::store::save(path, meta)
}

/// Sanitize a user-supplied session name to the safe character set
/// `[A-Za-z0-9_-]`; a name containing no safe characters collapses to
/// `"default"`.
pub fn sanitize_session_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_session_name("my-chat_1"), "my-chat_1");
    }

    #[test]
    fn sanitize_strips_unsafe_chars() {
        assert_eq!(sanitize_session_name("a/b c!"), "abc");
    }

    #[test]
    fn sanitize_all_unsafe_collapses_to_default() {
        assert_eq!(sanitize_session_name("///   !!!"), "default");
    }

    #[test]
    fn sanitize_empty_collapses_to_default() {
        assert_eq!(sanitize_session_name(""), "default");
    }

    #[test]
    fn default_session_uses_unsuffixed_path() {
        let dir = Path::new("/home/u");
        assert_eq!(
            history_path(dir, "default"),
            dir.join("cursor-enhanced-history.json")
        );
    }

    #[test]
    fn named_session_uses_suffixed_path() {
        let dir = Path::new("/home/u");
        assert_eq!(
            history_path(dir, "work"),
            dir.join("cursor-enhanced-history-work.json")
        );
    }

    #[test]
    fn history_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.json");
        let history = vec![HistoryEntry::user("hi"), HistoryEntry::agent("hello")];
        save_history(&path, &history).unwrap();
        let reread = load_history(&path);
        assert_eq!(reread, history);
    }

    #[test]
    fn summary_entry_has_fixed_prefix() {
        let e = HistoryEntry::summary("foo bar");
        assert_eq!(e.role, "system");
        assert_eq!(e.content, "Previous conversation summary: foo bar");
    }
}
