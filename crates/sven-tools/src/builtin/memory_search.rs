// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::MemorySearchBackend;
use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};

const DEFAULT_LIMIT: usize = 5;

pub struct MemorySearchTool {
    pub backend: Arc<dyn MemorySearchBackend>,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Full-text search over the durable memory workspace (MEMORY.md and dated daily notes). \
         Returns matching snippets with file path and line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Max hits to return (default 5)" }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::MatchList
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = match call.args.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolOutput::err(&call.id, "missing 'query'"),
        };
        let limit = call.args.get("limit").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_LIMIT as u64) as usize;

        match self.backend.search(query, limit) {
            Ok(hits) if hits.is_empty() => ToolOutput::ok(&call.id, "no matches found"),
            Ok(hits) => {
                let body = hits
                    .iter()
                    .map(|h| format!("{}:{}-{}\n{}", h.path, h.start_line, h.end_line, h.snippet))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                ToolOutput::ok(&call.id, body)
            }
            Err(e) => ToolOutput::err(&call.id, format!("memory search error: {e}")),
        }
    }
}
