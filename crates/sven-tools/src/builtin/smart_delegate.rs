// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::SmartDelegateBackend;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct SmartDelegateTool {
    pub backend: Arc<dyn SmartDelegateBackend>,
}

#[async_trait]
impl Tool for SmartDelegateTool {
    fn name(&self) -> &str {
        "smart_delegate"
    }

    fn description(&self) -> &str {
        "Delegate a task to the best-fit available model, chosen by scoring the task's \
         complexity and walking a tier-ranked preference list of available models."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "Task description" },
                "exclude_model": { "type": "string", "description": "Model id to exclude from selection" }
            },
            "required": ["task"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let task = match call.args.get("task").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return ToolOutput::err(&call.id, "missing 'task'"),
        };
        let exclude = call.args.get("exclude_model").and_then(|v| v.as_str());

        let result = self.backend.smart_delegate(task, exclude).await;
        if result.success {
            let body = format!("{}\n{}", result.announcement, result.response);
            ToolOutput::ok(&call.id, body)
        } else {
            ToolOutput::err(&call.id, result.error.unwrap_or_else(|| "smart delegate failed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SmartDelegateResult;

    struct FakeSmart;
    #[async_trait]
    impl SmartDelegateBackend for FakeSmart {
        async fn smart_delegate(&self, task: &str, exclude_model: Option<&str>) -> SmartDelegateResult {
            SmartDelegateResult {
                success: true,
                response: format!("did {task}"),
                announcement: format!("chose model (excluding {:?})", exclude_model),
                model_id: "auto".into(),
                tier: "fast".into(),
                score: 0.3,
                error: None,
            }
        }
    }

    fn call(args: Value) -> ToolCall {
        ToolCall { id: "t".into(), name: "smart_delegate".into(), args }
    }

    #[tokio::test]
    async fn missing_task_is_error() {
        let t = SmartDelegateTool { backend: Arc::new(FakeSmart) };
        assert!(t.execute(&call(json!({}))).await.is_error);
    }

    #[tokio::test]
    async fn success_includes_announcement_and_response() {
        let t = SmartDelegateTool { backend: Arc::new(FakeSmart) };
        let out = t.execute(&call(json!({"task": "build x"}))).await;
        assert!(out.content.contains("chose model"));
        assert!(out.content.contains("did build x"));
    }
}
