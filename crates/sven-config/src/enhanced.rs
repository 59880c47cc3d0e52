// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Single-file JSON configuration for the orchestration layer
//! (`~/.cursor-enhanced-config.json`), distinct from the model-provider
//! [`crate::Config`] used by the rest of the agent. See DESIGN.md for why
//! this file is JSON while the agent's own config stays YAML.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::child_agent::ChildAgentConfig;

fn default_history_limit() -> usize {
    20
}

fn default_delegate_timeout() -> u64 {
    3600
}

fn default_scheduler_interval() -> u64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPersonaConfig {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelegateConfig {
    pub cursor_agent_path: Option<String>,
    #[serde(default = "default_delegate_timeout")]
    pub timeout_secs: u64,
}

impl DelegateConfig {
    fn defaulted() -> Self {
        Self {
            cursor_agent_path: None,
            timeout_secs: default_delegate_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub menu_items: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedConfig {
    pub cursor_agent_path: Option<String>,
    #[serde(default = "DelegateConfig::defaulted")]
    pub delegate: DelegateConfig,
    #[serde(default)]
    pub agent_personas: Vec<AgentPersonaConfig>,
    #[serde(default)]
    pub telegram: TelegramSettings,
    pub mcp_config_path: Option<String>,
    pub home_assistant_token: Option<String>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_scheduler_interval")]
    pub scheduler_interval_secs: u64,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for EnhancedConfig {
    fn default() -> Self {
        Self {
            cursor_agent_path: None,
            delegate: DelegateConfig::defaulted(),
            agent_personas: Vec::new(),
            telegram: TelegramSettings::default(),
            mcp_config_path: None,
            home_assistant_token: None,
            history_limit: default_history_limit(),
            scheduler_interval_secs: default_scheduler_interval(),
            extra: HashMap::new(),
        }
    }
}

impl ChildAgentConfig for EnhancedConfig {
    fn cursor_agent_path(&self) -> Option<&str> {
        self.cursor_agent_path
            .as_deref()
            .or(self.delegate.cursor_agent_path.as_deref())
    }
}

/// Ordered list of JSON config file locations, lowest to highest priority.
/// Mirrors the YAML [`crate::loader`]'s layered-search-path shape, but
/// resolves to the single JSON file this spec's persisted-state layout
/// names.
fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".cursor-enhanced-config.json"));
    }
    paths.push(PathBuf::from(".cursor-enhanced.json"));
    paths
}

/// Deep-merge one JSON object into another; `src` wins on scalar conflicts.
fn merge_json(dst: &mut serde_json::Value, src: serde_json::Value) {
    match (dst, src) {
        (serde_json::Value::Object(d), serde_json::Value::Object(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_json::Value::Object(serde_json::Map::new()));
                merge_json(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

/// Load the enhanced config, honoring (in ascending priority) the bundled
/// search paths, the `CURSOR_ENHANCED_CONFIG` environment variable, and an
/// explicit `extra` path (e.g. a CLI `--config` flag). A missing or
/// malformed file at any layer is skipped rather than treated as fatal,
/// matching the store-corruption policy used elsewhere in this system.
pub fn load_enhanced_config(extra: Option<&Path>) -> EnhancedConfig {
    let mut merged = serde_json::Value::Object(serde_json::Map::new());
    let mut any = false;

    for path in search_paths() {
        if let Some(layer) = read_layer(&path) {
            merge_json(&mut merged, layer);
            any = true;
        }
    }
    if let Ok(env_path) = std::env::var("CURSOR_ENHANCED_CONFIG") {
        if let Some(layer) = read_layer(Path::new(&env_path)) {
            merge_json(&mut merged, layer);
            any = true;
        }
    }
    if let Some(p) = extra {
        if let Some(layer) = read_layer(p) {
            merge_json(&mut merged, layer);
            any = true;
        }
    }

    if !any {
        return EnhancedConfig::default();
    }
    serde_json::from_value(merged).unwrap_or_default()
}

fn read_layer(path: &Path) -> Option<serde_json::Value> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
