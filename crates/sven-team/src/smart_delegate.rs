// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Smart-Delegate runner: scores task complexity, picks a model tier,
//! announces the choice, and runs the child agent with that model pinned.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sven_config::EnhancedConfig;
use sven_tools::backends::{SmartDelegateBackend, SmartDelegateResult};

use crate::complexity::{self, ComplexityAssessment};
use crate::delegate::mcp_config_env;
use crate::models::{self, ModelChoice, ModelDiscovery};

const MIN_TIMEOUT_SECS: u64 = 60;

fn tier_emoji(tier: &str) -> &'static str {
    match tier {
        "xhigh" => "🧠",
        "high" => "💪",
        "mid" => "⚙️",
        "low" => "⚡",
        _ => "🏃",
    }
}

/// Render the same announcement block shown to the user before the task
/// runs, summarizing the complexity assessment and chosen model.
pub fn format_announcement(assessment: &ComplexityAssessment, choice: &ModelChoice) -> String {
    let mut lines = vec![format!(
        "{} Smart-Delegate: {} tier ({:.0}% complexity)",
        tier_emoji(&choice.tier),
        choice.tier,
        assessment.score * 100.0
    )];
    if !assessment.signal_matches.is_empty() {
        lines.push(format!("Signals: {}", assessment.signal_matches.join(", ")));
    }
    lines.push(format!("Model: {}", choice.model_id));
    for reason in &choice.reasons {
        lines.push(format!("- {reason}"));
    }
    lines.join("\n")
}

pub struct SmartDelegateRunner {
    binary: Option<PathBuf>,
    timeout: Duration,
    discovery: Arc<ModelDiscovery>,
    mcp_config_path: Option<String>,
}

impl SmartDelegateRunner {
    pub fn new(config: &EnhancedConfig) -> Self {
        Self {
            binary: sven_config::resolve_child_agent_path(config),
            timeout: Duration::from_secs(config.delegate.timeout_secs.max(MIN_TIMEOUT_SECS)),
            discovery: ModelDiscovery::new(),
            mcp_config_path: config.mcp_config_path.clone(),
        }
    }
}

#[async_trait]
impl SmartDelegateBackend for SmartDelegateRunner {
    async fn smart_delegate(&self, task: &str, exclude_model: Option<&str>) -> SmartDelegateResult {
        let Some(binary) = &self.binary else {
            return SmartDelegateResult {
                success: false,
                response: String::new(),
                announcement: String::new(),
                model_id: String::new(),
                tier: String::new(),
                score: 0.0,
                error: Some("child agent binary not found".to_string()),
            };
        };

        let assessment = complexity::assess(task);

        let available = match self.discovery.discover(binary, self.timeout).await {
            Ok(models) => models,
            Err(e) => {
                tracing::warn!(error = %e, "model discovery failed, proceeding with auto selection");
                Vec::new()
            }
        };

        let choice = models::select_model(&assessment.tier, &available, exclude_model);
        let announcement = format_announcement(&assessment, &choice);

        let mut args = Vec::new();
        if choice.model_id != "auto" {
            args.push("--model".to_string());
            args.push(choice.model_id.clone());
        }
        args.push("--print".to_string());
        args.push(task.to_string());

        let env = mcp_config_env(self.mcp_config_path.as_deref());
        match sven_config::invoke_child_agent(binary, &args, &env, self.timeout).await {
            Ok(out) if out.timed_out => SmartDelegateResult {
                success: false,
                response: String::new(),
                announcement,
                model_id: choice.model_id,
                tier: choice.tier,
                score: assessment.score,
                error: Some(format!("smart delegate timed out after {:?}", self.timeout)),
            },
            Ok(out) if !out.success() => SmartDelegateResult {
                success: false,
                response: String::new(),
                announcement,
                model_id: choice.model_id,
                tier: choice.tier,
                score: assessment.score,
                error: Some(if out.stderr.is_empty() {
                    format!("child agent exited with code {:?}", out.exit_code)
                } else {
                    out.stderr
                }),
            },
            Ok(out) => SmartDelegateResult {
                success: true,
                response: out.stdout.trim().to_string(),
                announcement,
                model_id: choice.model_id,
                tier: choice.tier,
                score: assessment.score,
                error: None,
            },
            Err(e) => SmartDelegateResult {
                success: false,
                response: String::new(),
                announcement,
                model_id: choice.model_id,
                tier: choice.tier,
                score: assessment.score,
                error: Some(e.to_string()),
            },
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelInfo;

    #[test]
    fn announcement_includes_tier_and_model() {
        let assessment = complexity::assess("hello");
        let choice = ModelChoice {
            model_id: "gpt-4o-mini".into(),
            model_name: "GPT-4o mini".into(),
            tier: "fast".into(),
            reasons: vec!["Selected gpt-4o-mini for fast tier".into()],
            available_models: vec![ModelInfo { id: "gpt-4o-mini".into(), name: "GPT-4o mini".into() }],
        };
        let text = format_announcement(&assessment, &choice);
        assert!(text.contains("fast"));
        assert!(text.contains("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn missing_binary_fails_cleanly() {
        let runner = SmartDelegateRunner::new(&EnhancedConfig::default());
        if runner.binary.is_none() {
            let result = runner.smart_delegate("hello", None).await;
            assert!(!result.success);
        }
    }

    #[test]
    fn carries_the_same_mcp_config_env_key_as_delegate() {
        let mut config = EnhancedConfig::default();
        config.mcp_config_path = Some("/etc/sven/mcp.json".to_string());
        let runner = SmartDelegateRunner::new(&config);
        let env = mcp_config_env(runner.mcp_config_path.as_deref());
        assert_eq!(env.get("CURSOR_MCP_CONFIG_PATH").map(String::as_str), Some("/etc/sven/mcp.json"));
    }
}
