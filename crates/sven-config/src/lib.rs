// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod child_agent;
mod enhanced;
mod loader;
mod schema;
pub mod store;

pub use child_agent::{invoke as invoke_child_agent, resolve_path as resolve_child_agent_path};
pub use child_agent::{ChildAgentConfig, ChildAgentOutput};
pub use enhanced::{load_enhanced_config, AgentPersonaConfig, DelegateConfig, EnhancedConfig, TelegramSettings};
pub use loader::load;
pub use schema::*;
