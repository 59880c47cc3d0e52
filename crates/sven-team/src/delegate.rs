// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Delegate runner: invokes the child agent under a fixed persona.
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sven_config::EnhancedConfig;
use sven_tools::backends::{DelegateBackend, DelegateResult};

use crate::personas::PersonaTable;

const MIN_TIMEOUT_SECS: u64 = 60;

/// Child-specific env carrying just the MCP config path, shared by every
/// path that invokes the child agent — [`DelegateRunner::build_env`] layers
/// the persona-specific Home Assistant token on top of this for personas.
pub fn mcp_config_env(mcp_config_path: Option<&str>) -> HashMap<String, String> {
    let mut env = HashMap::new();
    if let Some(path) = mcp_config_path {
        env.insert("CURSOR_MCP_CONFIG_PATH".to_string(), path.to_string());
    }
    env
}

/// Reads the Home Assistant long-lived access token out of an MCP config
/// file's `home-assistant`/`home_assistant` server entry, if present.
fn ha_token_from_mcp_config(mcp_config_path: &str) -> Option<String> {
    let text = std::fs::read_to_string(mcp_config_path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&text).ok()?;
    let servers = json.get("mcpServers").or_else(|| json.get("mcp_servers"))?;
    let ha = servers.get("home-assistant").or_else(|| servers.get("home_assistant"))?;
    let env = ha.get("env")?;
    for key in ["HOME_ASSISTANT_ACCESS_TOKEN", "HOME_ASSISTANT_TOKEN"] {
        if let Some(v) = env.get(key).and_then(|v| v.as_str()) {
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }
    None
}

pub struct DelegateRunner {
    personas: PersonaTable,
    binary: Option<PathBuf>,
    timeout: Duration,
    mcp_config_path: Option<String>,
    home_assistant_token: Option<String>,
}

impl DelegateRunner {
    pub fn new(config: &EnhancedConfig) -> Self {
        let binary = sven_config::resolve_child_agent_path(config);
        let timeout_secs = config.delegate.timeout_secs.max(MIN_TIMEOUT_SECS);
        Self {
            personas: PersonaTable::new(&config.agent_personas),
            binary,
            timeout: Duration::from_secs(timeout_secs),
            mcp_config_path: config.mcp_config_path.clone(),
            home_assistant_token: config.home_assistant_token.clone(),
        }
    }

    /// Child-specific env (MCP config path, plus the Home Assistant token
    /// for that one persona).
    pub fn build_env(&self, persona_id: &str) -> HashMap<String, String> {
        let mut env = mcp_config_env(self.mcp_config_path.as_deref());
        if persona_id == "home_assistant" {
            let token = self.home_assistant_token.clone().or_else(|| {
                self.mcp_config_path.as_deref().and_then(ha_token_from_mcp_config)
            });
            if let Some(token) = token {
                env.insert("HOME_ASSISTANT_TOKEN".to_string(), token);
            }
        }
        env
    }
}

#[async_trait]
impl DelegateBackend for DelegateRunner {
    async fn delegate(&self, persona_id: &str, task: &str) -> DelegateResult {
        let Some(persona) = self.personas.get(persona_id) else {
            return DelegateResult {
                success: false,
                response: String::new(),
                persona_id: persona_id.to_string(),
                persona_name: String::new(),
                error: Some(format!(
                    "unknown persona '{persona_id}', available: {}",
                    self.personas.ids().join(", ")
                )),
            };
        };

        let Some(binary) = &self.binary else {
            return DelegateResult {
                success: false,
                response: String::new(),
                persona_id: persona.id.clone(),
                persona_name: persona.name.clone(),
                error: Some("child agent binary not found".to_string()),
            };
        };

        let env = self.build_env(&persona.id);
        let args = vec![
            "--system-prompt".to_string(),
            persona.system_prompt.clone(),
            "--print".to_string(),
            task.to_string(),
        ];

        match sven_config::invoke_child_agent(binary, &args, &env, self.timeout).await {
            Ok(out) if out.timed_out => DelegateResult {
                success: false,
                response: String::new(),
                persona_id: persona.id.clone(),
                persona_name: persona.name.clone(),
                error: Some(format!("delegate timed out after {:?}", self.timeout)),
            },
            Ok(out) if !out.success() => DelegateResult {
                success: false,
                response: String::new(),
                persona_id: persona.id.clone(),
                persona_name: persona.name.clone(),
                error: Some(if out.stderr.is_empty() {
                    format!("child agent exited with code {:?}", out.exit_code)
                } else {
                    out.stderr
                }),
            },
            Ok(out) => DelegateResult {
                success: true,
                response: out.stdout.trim().to_string(),
                persona_id: persona.id.clone(),
                persona_name: persona.name.clone(),
                error: None,
            },
            Err(e) => DelegateResult {
                success: false,
                response: String::new(),
                persona_id: persona.id.clone(),
                persona_name: persona.name.clone(),
                error: Some(e.to_string()),
            },
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
