// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Sub-agent orchestrator: persona delegation (Delegate), complexity-scored
//! model tiering (Smart-Delegate), detached background runs, the Cursor
//! Cloud Agents client, and the execution Tracker shared by all of them.
pub mod complexity;
pub mod cursor_agent;
pub mod delegate;
pub mod detached;
pub mod error;
pub mod memory_search;
pub mod models;
pub mod personas;
pub mod smart_delegate;
pub mod tracker;
pub mod weather;

pub use error::Error;
pub use tracker::Tracker;

use std::sync::Arc;

use sven_config::EnhancedConfig;

/// Every backend this crate provides to [`sven_tools::ToolRegistry`], built
/// once at process start from a loaded [`EnhancedConfig`].
pub struct Backends {
    pub delegate: Arc<dyn sven_tools::backends::DelegateBackend>,
    pub smart_delegate: Arc<dyn sven_tools::backends::SmartDelegateBackend>,
    pub cursor_agent: Arc<dyn sven_tools::backends::CursorAgentBackend>,
    pub memory_search: Arc<dyn sven_tools::backends::MemorySearchBackend>,
    pub weather: Arc<dyn sven_tools::backends::WeatherBackend>,
    pub tracker: Arc<Tracker>,
}

/// Construct the concrete backend singletons from config. The Cursor Cloud
/// Agents API key is read from config or the `CURSOR_API_KEY` environment
/// variable, matching the child-agent binary's own env-var precedence.
pub fn build_backends(config: &EnhancedConfig) -> Backends {
    let api_key = std::env::var("CURSOR_API_KEY").unwrap_or_default();
    let cursor_agent = cursor_agent::CursorCloudAgent::new(api_key)
        .expect("reqwest client for cursor agent client builds");
    let weather = weather::OpenMeteoWeather::default();
    let tracker = Tracker::new(sven_memory::paths::subagent_tracker_path());

    Backends {
        delegate: Arc::new(delegate::DelegateRunner::new(config)),
        smart_delegate: Arc::new(smart_delegate::SmartDelegateRunner::new(config)),
        cursor_agent: Arc::new(cursor_agent),
        memory_search: Arc::new(memory_search::WorkspaceMemorySearch::default()),
        weather: Arc::new(weather),
        tracker,
    }
}
