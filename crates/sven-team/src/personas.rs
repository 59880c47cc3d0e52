// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Delegate persona table: fixed ids mapped to system prompts, with
//! config overrides layered on top of the built-in defaults.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sven_config::AgentPersonaConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPersona {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
}

const HOME_ASSISTANT_PROMPT: &str = "Home Assistant specialist. Use MCP to list/control entities, \
call services, check states, and suggest automations. Be concise and precise with entity IDs and \
service names. Never fabricate device state: if a state or entity is not confirmed through a tool \
call, say so instead of guessing.";

pub fn default_personas() -> Vec<AgentPersona> {
    vec![
        AgentPersona {
            id: "researcher".into(),
            name: "Researcher".into(),
            system_prompt: "You are a thorough researcher. Gather and summarize information, cite \
                sources when possible, and present clear, structured answers. Stay factual and concise."
                .into(),
        },
        AgentPersona {
            id: "coder".into(),
            name: "Coder".into(),
            system_prompt: "You are a pragmatic software engineer. Write clean, working code. \
                Prefer standard libraries and clear logic. Output code first, brief explanation after."
                .into(),
        },
        AgentPersona {
            id: "reviewer".into(),
            name: "Reviewer".into(),
            system_prompt: "You are a critical reviewer. Analyze the given content for correctness, \
                style, security, and maintainability. List concrete issues and short suggestions."
                .into(),
        },
        AgentPersona {
            id: "writer".into(),
            name: "Writer".into(),
            system_prompt: "You are a clear technical writer. Explain concepts in plain language, \
                use structure (headers, lists), and avoid jargon unless necessary."
                .into(),
        },
        AgentPersona {
            id: "home_assistant".into(),
            name: "Home Assistant".into(),
            system_prompt: HOME_ASSISTANT_PROMPT.into(),
        },
    ]
}

/// Persona lookup table: defaults merged with config overrides (config wins
/// on id collision), mirroring [`sven_config::EnhancedConfig::agent_personas`].
pub struct PersonaTable {
    personas: HashMap<String, AgentPersona>,
}

impl PersonaTable {
    pub fn new(overrides: &[AgentPersonaConfig]) -> Self {
        let mut personas: HashMap<String, AgentPersona> = default_personas()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        for p in overrides {
            personas.insert(
                p.id.clone(),
                AgentPersona {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    system_prompt: p.system_prompt.clone(),
                },
            );
        }
        Self { personas }
    }

    pub fn get(&self, id: &str) -> Option<&AgentPersona> {
        self.personas.get(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.personas.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for PersonaTable {
    fn default() -> Self {
        Self::new(&[])
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_five_personas() {
        let table = PersonaTable::default();
        assert_eq!(table.ids().len(), 5);
        assert!(table.get("coder").is_some());
        assert!(table.get("home_assistant").is_some());
    }

    #[test]
    fn config_override_replaces_default_by_id() {
        let overrides = vec![AgentPersonaConfig {
            id: "coder".into(),
            name: "Custom Coder".into(),
            system_prompt: "Write terse Rust.".into(),
        }];
        let table = PersonaTable::new(&overrides);
        let p = table.get("coder").unwrap();
        assert_eq!(p.name, "Custom Coder");
        assert_eq!(p.system_prompt, "Write terse Rust.");
    }

    #[test]
    fn unknown_persona_is_none() {
        assert!(PersonaTable::default().get("unknown").is_none());
    }

    #[test]
    fn home_assistant_prompt_warns_against_fabrication() {
        let table = PersonaTable::default();
        let p = table.get("home_assistant").unwrap();
        assert!(p.system_prompt.contains("fabricate"));
    }
}
