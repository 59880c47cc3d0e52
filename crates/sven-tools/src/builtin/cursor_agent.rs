// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::CursorAgentBackend;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub const VERBS: &[&str] = &[
    "launch", "status", "list", "conversation", "followup", "stop", "delete", "models", "repos", "me",
];

pub struct CursorAgentTool {
    pub backend: Arc<dyn CursorAgentBackend>,
}

#[async_trait]
impl Tool for CursorAgentTool {
    fn name(&self) -> &str {
        "cursor_agent"
    }

    fn description(&self) -> &str {
        "Control the underlying child-agent process directly: launch, status, list, \
         conversation, followup, stop, delete, models, repos, me."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "verb": { "type": "string", "enum": VERBS },
                "args": { "type": "string", "description": "Optional arguments for the verb" }
            },
            "required": ["verb"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let verb = match call.args.get("verb").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolOutput::err(&call.id, "missing 'verb'"),
        };
        if !VERBS.contains(&verb) {
            return ToolOutput::err(&call.id, format!("unknown cursor_agent verb '{verb}'"));
        }
        let args = call.args.get("args").and_then(|v| v.as_str()).unwrap_or("");

        match self.backend.run(verb, args).await {
            Ok(result) => {
                if !result.summary.is_empty() {
                    ToolOutput::ok(&call.id, result.summary)
                } else {
                    let snippet = serde_json::to_string_pretty(&result.raw).unwrap_or_default();
                    let truncated = if snippet.len() > 3000 {
                        format!("{}...", &snippet[..3000])
                    } else {
                        snippet
                    };
                    ToolOutput::ok(&call.id, truncated)
                }
            }
            Err(e) => ToolOutput::err(&call.id, format!("cursor_agent error: {e}")),
        }
    }
}
