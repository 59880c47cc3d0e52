// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cursor Cloud Agents API client: launch and manage cloud agents on a
//! repository. Distinct from the local child-agent subprocess used by
//! Delegate/Smart-Delegate — this talks to `https://api.cursor.com/v0`.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sven_tools::backends::{CursorAgentActionResult, CursorAgentBackend};

const API_BASE: &str = "https://api.cursor.com/v0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MODEL: &str = "default";

/// Parse a flat `key=value key2=value2` argument string (quoting not
/// supported — values containing spaces should use `prompt=...` last).
fn parse_args(args: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut rest = args.trim();
    while let Some(eq) = rest.find('=') {
        let key_start = rest[..eq].rfind(char::is_whitespace).map(|i| i + 1).unwrap_or(0);
        let key = rest[key_start..eq].trim().to_string();
        let value_rest = &rest[eq + 1..];
        let next_key_pos = value_rest
            .match_indices('=')
            .filter_map(|(pos, _)| {
                let candidate_start = value_rest[..pos].rfind(char::is_whitespace)? + 1;
                Some(candidate_start)
            })
            .next();
        let (value, remainder) = match next_key_pos {
            Some(pos) => (value_rest[..pos].trim(), &value_rest[pos..]),
            None => (value_rest.trim(), ""),
        };
        if !key.is_empty() {
            map.insert(key, value.to_string());
        }
        rest = remainder;
    }
    map
}

pub struct CursorCloudAgent {
    client: reqwest::Client,
    api_key: String,
    default_model: String,
}

impl CursorCloudAgent {
    pub fn new(api_key: String) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("sven-agent/0.1")
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client, api_key, default_model: DEFAULT_MODEL.to_string() })
    }

    fn check_configured(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err(
                "Cursor API key not configured. Set CURSOR_API_KEY or cursor_agent.api_key.".to_string(),
            );
        }
        Ok(())
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, String> {
        self.check_configured()?;
        let response = self
            .client
            .get(format!("{API_BASE}{path}"))
            .basic_auth(&self.api_key, Some(""))
            .query(query)
            .send()
            .await
            .map_err(|e| format!("cursor agent API request failed: {e}"))?;
        parse_response(response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, String> {
        self.check_configured()?;
        let response = self
            .client
            .post(format!("{API_BASE}{path}"))
            .basic_auth(&self.api_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("cursor agent API request failed: {e}"))?;
        parse_response(response).await
    }

    async fn delete(&self, path: &str) -> Result<Value, String> {
        self.check_configured()?;
        let response = self
            .client
            .delete(format!("{API_BASE}{path}"))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(|e| format!("cursor agent API request failed: {e}"))?;
        parse_response(response).await
    }

    async fn launch(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let prompt = args.get("prompt").ok_or("prompt is required")?;
        let repository = args.get("repository");
        let pr_url = args.get("pr_url");
        if repository.is_none() && pr_url.is_none() {
            return Err("either repository or pr_url is required".to_string());
        }

        let mut source = serde_json::Map::new();
        if let Some(pr_url) = pr_url {
            source.insert("prUrl".into(), json!(pr_url));
        } else if let Some(repo) = repository {
            source.insert("repository".into(), json!(repo));
            if let Some(r) = args.get("ref") {
                source.insert("ref".into(), json!(r));
            }
        }

        // Model policy: never silently upgrade to a non-default model.
        let user_confirmed = args.get("user_confirmed_model").map(|v| v == "true").unwrap_or(false);
        let requested_model = args.get("model").cloned();
        let effective_model = match (&requested_model, user_confirmed) {
            (Some(m), true) if m != "default" => m.clone(),
            _ => self.default_model.clone(),
        };

        let mut body = json!({
            "prompt": { "text": prompt },
            "source": source,
            "model": effective_model,
        });

        let mut target = serde_json::Map::new();
        if args.get("auto_create_pr").map(|v| v == "true").unwrap_or(false) {
            target.insert("autoCreatePr".into(), json!(true));
        }
        if let Some(branch) = args.get("branch_name") {
            target.insert("branchName".into(), json!(branch));
        }
        if !target.is_empty() {
            body.as_object_mut().unwrap().insert("target".into(), Value::Object(target));
        }

        let raw = self.post("/agents", body).await?;
        let summary = format!(
            "Agent '{}' launched (id={}). Status: {}.",
            raw.get("name").and_then(|v| v.as_str()).unwrap_or("unnamed"),
            raw.get("id").and_then(|v| v.as_str()).unwrap_or("?"),
            raw.get("status").and_then(|v| v.as_str()).unwrap_or("?"),
        );
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn status(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let agent_id = args.get("agent_id").ok_or("agent_id is required")?;
        let raw = self.get(&format!("/agents/{agent_id}"), &[]).await?;
        let summary = format!(
            "Agent '{}': {}.",
            raw.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
            raw.get("status").and_then(|v| v.as_str()).unwrap_or("?"),
        );
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn list_agents(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let limit = args.get("limit").and_then(|v| v.parse::<u32>().ok()).unwrap_or(20).min(100);
        let raw = self.get("/agents", &[("limit", limit.to_string())]).await?;
        let agents = raw.get("agents").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let lines: Vec<String> = agents
            .iter()
            .map(|a| {
                format!(
                    "  {} | {} | {}",
                    a.get("id").and_then(|v| v.as_str()).unwrap_or("?"),
                    a.get("status").and_then(|v| v.as_str()).unwrap_or("?"),
                    a.get("name").and_then(|v| v.as_str()).unwrap_or("unnamed"),
                )
            })
            .collect();
        let summary = if lines.is_empty() {
            "No agents found.".to_string()
        } else {
            format!("{} agent(s):\n{}", agents.len(), lines.join("\n"))
        };
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn conversation(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let agent_id = args.get("agent_id").ok_or("agent_id is required")?;
        let raw = self.get(&format!("/agents/{agent_id}/conversation"), &[]).await?;
        let messages = raw.get("messages").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let summary = format!("{} message(s) in conversation {agent_id}.", messages.len());
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn followup(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let agent_id = args.get("agent_id").ok_or("agent_id is required")?;
        let prompt = args.get("prompt").ok_or("prompt is required")?;
        let raw = self
            .post(&format!("/agents/{agent_id}/followup"), json!({"prompt": {"text": prompt}}))
            .await?;
        Ok(CursorAgentActionResult { summary: format!("Follow-up sent to agent {agent_id}."), raw })
    }

    async fn stop(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let agent_id = args.get("agent_id").ok_or("agent_id is required")?;
        let raw = self.post(&format!("/agents/{agent_id}/stop"), json!({})).await?;
        Ok(CursorAgentActionResult { summary: format!("Agent {agent_id} stopped."), raw })
    }

    async fn delete_agent(&self, args: &HashMap<String, String>) -> Result<CursorAgentActionResult, String> {
        let agent_id = args.get("agent_id").ok_or("agent_id is required")?;
        let raw = self.delete(&format!("/agents/{agent_id}")).await?;
        Ok(CursorAgentActionResult { summary: format!("Agent {agent_id} deleted."), raw })
    }

    async fn list_models(&self) -> Result<CursorAgentActionResult, String> {
        let raw = self.get("/models", &[]).await?;
        let models: Vec<String> = raw
            .get("models")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|m| m.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let summary = if models.is_empty() {
            "No models returned.".to_string()
        } else {
            format!("Available models: {}", models.join(", "))
        };
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn list_repos(&self) -> Result<CursorAgentActionResult, String> {
        let raw = self.get("/repositories", &[]).await?;
        let repos = raw.get("repositories").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let summary = if repos.is_empty() {
            "No repositories found.".to_string()
        } else {
            format!("{} repo(s) accessible.", repos.len())
        };
        Ok(CursorAgentActionResult { summary, raw })
    }

    async fn me(&self) -> Result<CursorAgentActionResult, String> {
        let raw = self.get("/me", &[]).await?;
        let summary = format!(
            "Key: {}, Email: {}",
            raw.get("apiKeyName").and_then(|v| v.as_str()).unwrap_or("?"),
            raw.get("userEmail").and_then(|v| v.as_str()).unwrap_or("?"),
        );
        Ok(CursorAgentActionResult { summary, raw })
    }
}

async fn parse_response(response: reqwest::Response) -> Result<Value, String> {
    let status = response.status();
    let text = response.text().await.map_err(|e| e.to_string())?;
    if !status.is_success() {
        return Err(format!("HTTP {status}: {}", &text[..text.len().min(500)]));
    }
    serde_json::from_str(&text).map_err(|e| format!("malformed response: {e}"))
}

#[async_trait]
impl CursorAgentBackend for CursorCloudAgent {
    async fn run(&self, verb: &str, args: &str) -> Result<CursorAgentActionResult, String> {
        let parsed = parse_args(args);
        match verb {
            "launch" => self.launch(&parsed).await,
            "status" => self.status(&parsed).await,
            "list" => self.list_agents(&parsed).await,
            "conversation" => self.conversation(&parsed).await,
            "followup" => self.followup(&parsed).await,
            "stop" => self.stop(&parsed).await,
            "delete" => self.delete_agent(&parsed).await,
            "models" => self.list_models().await,
            "repos" => self.list_repos().await,
            "me" => self.me().await,
            other => Err(format!("unknown cursor agent verb '{other}'")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
