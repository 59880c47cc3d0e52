// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Full-text search over the memory workspace (`MEMORY.md` and dated daily
//! notes), backed by SQLite FTS5. The index is rebuilt on each search from
//! the current file contents; memory files are small enough (human-written
//! notes) that this is simpler and more correct than tracking incremental
//! updates.
use std::path::Path;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySearchHit {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
}

struct Chunk {
    path: String,
    start_line: usize,
    end_line: usize,
    text: String,
}

/// Split a file's text into paragraph chunks (blank-line-delimited),
/// tracking each chunk's 1-based start/end line.
fn chunk_file(path: &str, text: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut start_line = 1usize;
    let mut buf = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        if line.trim().is_empty() {
            if !buf.is_empty() {
                chunks.push(Chunk {
                    path: path.to_string(),
                    start_line,
                    end_line: lineno - 1,
                    text: buf.join("\n"),
                });
                buf.clear();
            }
            start_line = lineno + 1;
        } else {
            buf.push(line.to_string());
        }
    }
    if !buf.is_empty() {
        chunks.push(Chunk {
            path: path.to_string(),
            start_line,
            end_line: start_line + buf.len() - 1,
            text: buf.join("\n"),
        });
    }
    chunks
}

fn collect_files(workspace_dir: &Path) -> Vec<(String, String)> {
    let mut files = Vec::new();
    let memory_file = workspace_dir.join("MEMORY.md");
    if let Ok(text) = std::fs::read_to_string(&memory_file) {
        files.push(("MEMORY.md".to_string(), text));
    }
    let daily_dir = workspace_dir.join("memory");
    if let Ok(entries) = std::fs::read_dir(&daily_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                if let Ok(text) = std::fs::read_to_string(&path) {
                    let rel = format!("memory/{}", path.file_name().unwrap().to_string_lossy());
                    files.push((rel, text));
                }
            }
        }
    }
    files
}

fn build_index(conn: &Connection, workspace_dir: &Path) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE memory_fts USING fts5(path, start_line UNINDEXED, end_line UNINDEXED, body);",
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO memory_fts (path, start_line, end_line, body) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (path, text) in collect_files(workspace_dir) {
        for chunk in chunk_file(&path, &text) {
            stmt.execute(rusqlite::params![
                chunk.path,
                chunk.start_line as i64,
                chunk.end_line as i64,
                chunk.text
            ])?;
        }
    }
    Ok(())
}

/// Search the memory workspace for `query`, returning up to `limit` hits
/// ordered by FTS5 relevance (bm25).
pub fn search(workspace_dir: &Path, query: &str, limit: usize) -> rusqlite::Result<Vec<MemorySearchHit>> {
    let conn = Connection::open_in_memory()?;
    build_index(&conn, workspace_dir)?;

    let fts_query = sanitize_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT path, start_line, end_line, snippet(memory_fts, 3, '**', '**', '...', 24) \
         FROM memory_fts WHERE memory_fts MATCH ?1 ORDER BY rank LIMIT ?2",
    )?;
    let rows = stmt.query_map(rusqlite::params![fts_query, limit as i64], |row| {
        Ok(MemorySearchHit {
            path: row.get(0)?,
            start_line: row.get::<_, i64>(1)? as usize,
            end_line: row.get::<_, i64>(2)? as usize,
            snippet: row.get(3)?,
        })
    })?;
    rows.collect()
}

/// FTS5 MATCH syntax treats `"`, `(`, `)`, `*`, `:`, `-` specially; quote
/// the whole query as a single phrase so arbitrary user text is safe to
/// pass through.
fn sanitize_fts_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("\"{}\"", trimmed.replace('"', "\"\""))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_file_splits_on_blank_lines() {
        let chunks = chunk_file("x.md", "first para\nline2\n\nsecond para\n");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[1].start_line, 4);
    }

    #[test]
    fn sanitize_wraps_in_quotes() {
        assert_eq!(sanitize_fts_query("hello world"), "\"hello world\"");
    }

    #[test]
    fn sanitize_empty_query_is_empty() {
        assert_eq!(sanitize_fts_query("   "), "");
    }

    #[test]
    fn search_finds_matching_chunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("MEMORY.md"),
            "User prefers dark mode in the editor.\n\nUser's favorite language is Rust.\n",
        )
        .unwrap();
        let hits = search(dir.path(), "Rust", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "MEMORY.md");
    }

    #[test]
    fn search_with_no_matches_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MEMORY.md"), "nothing relevant here\n").unwrap();
        let hits = search(dir.path(), "quantum entanglement", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_over_empty_workspace_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let hits = search(dir.path(), "anything", 10).unwrap();
        assert!(hits.is_empty());
    }
}
