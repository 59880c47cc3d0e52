// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::DelegateBackend;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct DelegateTool {
    pub backend: Arc<dyn DelegateBackend>,
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        "delegate"
    }

    fn description(&self) -> &str {
        "Delegate a task to a named sub-agent persona (researcher, coder, reviewer, writer, \
         home_assistant) and return its response."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "persona_id": { "type": "string", "description": "Persona id to delegate to" },
                "task": { "type": "string", "description": "Task description for the sub-agent" }
            },
            "required": ["persona_id", "task"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let persona_id = match call.args.get("persona_id").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolOutput::err(&call.id, "missing 'persona_id'"),
        };
        let task = match call.args.get("task").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return ToolOutput::err(&call.id, "missing 'task'"),
        };

        let result = self.backend.delegate(persona_id, task).await;
        if result.success {
            ToolOutput::ok(&call.id, result.response)
        } else {
            ToolOutput::err(&call.id, result.error.unwrap_or_else(|| "delegate failed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DelegateResult;

    struct FakeDelegate;
    #[async_trait]
    impl DelegateBackend for FakeDelegate {
        async fn delegate(&self, persona_id: &str, task: &str) -> DelegateResult {
            if persona_id == "unknown" {
                return DelegateResult {
                    success: false,
                    response: String::new(),
                    persona_id: persona_id.into(),
                    persona_name: String::new(),
                    error: Some("unknown persona".into()),
                };
            }
            DelegateResult {
                success: true,
                response: format!("[{persona_id}] did: {task}"),
                persona_id: persona_id.into(),
                persona_name: persona_id.into(),
                error: None,
            }
        }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "t".into(), name: "delegate".into(), args }
    }

    #[tokio::test]
    async fn missing_args_are_errors() {
        let t = DelegateTool { backend: Arc::new(FakeDelegate) };
        assert!(t.execute(&call(json!({"task": "x"}))).await.is_error);
        assert!(t.execute(&call(json!({"persona_id": "coder"}))).await.is_error);
    }

    #[tokio::test]
    async fn success_returns_response() {
        let t = DelegateTool { backend: Arc::new(FakeDelegate) };
        let out = t.execute(&call(json!({"persona_id": "coder", "task": "fix bug"}))).await;
        assert!(!out.is_error);
        assert!(out.content.contains("fix bug"));
    }

    #[tokio::test]
    async fn unknown_persona_is_error() {
        let t = DelegateTool { backend: Arc::new(FakeDelegate) };
        let out = t.execute(&call(json!({"persona_id": "unknown", "task": "x"}))).await;
        assert!(out.is_error);
    }
}
