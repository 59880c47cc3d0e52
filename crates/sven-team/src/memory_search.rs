// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adapts the memory workspace's full-text search to the tool dispatcher's
//! backend seam.
use sven_tools::backends::{MemorySearchBackend, MemorySearchHit};

pub struct WorkspaceMemorySearch {
    workspace_dir: std::path::PathBuf,
}

impl WorkspaceMemorySearch {
    pub fn new(workspace_dir: std::path::PathBuf) -> Self {
        Self { workspace_dir }
    }
}

impl Default for WorkspaceMemorySearch {
    fn default() -> Self {
        Self::new(sven_memory::paths::workspace_dir())
    }
}

impl MemorySearchBackend for WorkspaceMemorySearch {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<MemorySearchHit>, String> {
        sven_memory::memory_search(&self.workspace_dir, query, limit)
            .map(|hits| {
                hits.into_iter()
                    .map(|h| MemorySearchHit {
                        path: h.path,
                        start_line: h.start_line,
                        end_line: h.end_line,
                        snippet: h.snippet,
                    })
                    .collect()
            })
            .map_err(|e| e.to_string())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_over_empty_workspace_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = WorkspaceMemorySearch::new(dir.path().to_path_buf());
        let hits = backend.search("anything", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_finds_matching_note() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MEMORY.md"), "User loves idiomatic Rust code.\n").unwrap();
        let backend = WorkspaceMemorySearch::new(dir.path().to_path_buf());
        let hits = backend.search("Rust", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
