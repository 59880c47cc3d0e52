// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Narrow trait interfaces that the sub-agent orchestrator, memory store,
//! and chat front-end implement so their builtin tools can live in this
//! crate without a dependency cycle. Concrete implementations are
//! constructed once at process start and wired into the [`crate::ToolRegistry`]
//! as trait objects (per the "singletons as explicit context values"
//! design).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateResult {
    pub success: bool,
    pub response: String,
    pub persona_id: String,
    pub persona_name: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait DelegateBackend: Send + Sync {
    async fn delegate(&self, persona_id: &str, task: &str) -> DelegateResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartDelegateResult {
    pub success: bool,
    pub response: String,
    pub announcement: String,
    pub model_id: String,
    pub tier: String,
    pub score: f64,
    pub error: Option<String>,
}

#[async_trait]
pub trait SmartDelegateBackend: Send + Sync {
    async fn smart_delegate(&self, task: &str, exclude_model: Option<&str>) -> SmartDelegateResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchHit {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
}

pub trait MemorySearchBackend: Send + Sync {
    fn search(&self, query: &str, limit: usize) -> Result<Vec<MemorySearchHit>, String>;
}

#[async_trait]
pub trait WeatherBackend: Send + Sync {
    async fn weather(&self, location: &str) -> Result<String, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorAgentActionResult {
    pub summary: String,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait CursorAgentBackend: Send + Sync {
    async fn run(&self, verb: &str, args: &str) -> Result<CursorAgentActionResult, String>;
}
