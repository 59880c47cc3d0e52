// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model tier table and discovery/selection used by Smart-Delegate.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::Error;

/// Tiers ordered from cheapest/fastest to most capable.
pub const TIER_ORDER: &[&str] = &["fast", "low", "mid", "high", "xhigh"];

fn tier_rank(tier: &str) -> i32 {
    TIER_ORDER.iter().position(|t| *t == tier).map(|i| i as i32).unwrap_or(1)
}

/// Preferred model ids per tier, most to least preferred. Matched against
/// whatever `discover_models` actually finds on the child agent.
fn model_tiers() -> HashMap<&'static str, Vec<&'static str>> {
    HashMap::from([
        ("xhigh", vec!["claude-opus-4", "gpt-5", "o1-pro", "claude-3-opus"]),
        ("high", vec!["claude-sonnet-4", "gpt-5-mini", "o1", "claude-3-5-sonnet"]),
        ("mid", vec!["gpt-4o", "claude-3-5-haiku", "gpt-4o-mini"]),
        ("low", vec!["gpt-4o-mini", "claude-3-haiku", "gemini-flash"]),
        ("fast", vec!["gpt-4o-mini", "claude-3-haiku", "gemini-flash-8b"]),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub model_id: String,
    pub model_name: String,
    pub tier: String,
    pub reasons: Vec<String>,
    pub available_models: Vec<ModelInfo>,
}

const DISCOVERY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Caches the child agent's `--list-models` output for 5 minutes so
/// Smart-Delegate doesn't re-invoke the subprocess on every call.
pub struct ModelDiscovery {
    cache: Mutex<Option<(Instant, Vec<ModelInfo>)>>,
}

impl ModelDiscovery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { cache: Mutex::new(None) })
    }

    /// Run the child agent's model-listing flag and parse its output, or
    /// return the cached list if still fresh.
    pub async fn discover(
        &self,
        binary: &std::path::Path,
        timeout: Duration,
    ) -> Result<Vec<ModelInfo>, Error> {
        {
            let cache = self.cache.lock().await;
            if let Some((fetched_at, models)) = cache.as_ref() {
                if fetched_at.elapsed() < DISCOVERY_CACHE_TTL {
                    return Ok(models.clone());
                }
            }
        }

        let out = sven_config::invoke_child_agent(
            binary,
            &["--list-models".to_string()],
            &HashMap::new(),
            timeout,
        )
        .await
        .map_err(|e| Error::SubprocessFailure { code: None, stderr: e.to_string() })?;

        if out.timed_out {
            return Err(Error::Timeout(timeout));
        }
        if !out.success() {
            return Err(Error::SubprocessFailure { code: out.exit_code, stderr: out.stderr });
        }

        let models = parse_model_list(&out.stdout);
        let mut cache = self.cache.lock().await;
        *cache = Some((Instant::now(), models.clone()));
        Ok(models)
    }
}

impl Default for ModelDiscovery {
    fn default() -> Self {
        Self { cache: Mutex::new(None) }
    }
}

fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&n) = chars.peek() {
                    chars.next();
                    if n.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Parse `<id> - <name>` lines out of the child agent's model-list output,
/// skipping headers, tips, loading spinners, and `(default)`/`(current)`
/// markers.
fn parse_model_list(stdout: &str) -> Vec<ModelInfo> {
    let mut models = Vec::new();
    for raw in stdout.lines() {
        let line = strip_ansi(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if lower.starts_with("tip:")
            || lower.starts_with("loading")
            || lower.starts_with("available models")
            || lower.starts_with("models:")
        {
            continue;
        }
        let Some((id_part, name_part)) = line.split_once(" - ") else {
            continue;
        };
        let id = id_part.trim().to_string();
        let mut name = name_part.trim().to_string();
        for marker in ["(default)", "(current)"] {
            name = name.replace(marker, "").trim().to_string();
        }
        if id.is_empty() || name.is_empty() {
            continue;
        }
        models.push(ModelInfo { id, name });
    }
    models
}

/// Pick the best available model for `tier`, falling back to progressively
/// more distant tiers, and finally to `"auto"` if nothing matches.
pub fn select_model(
    tier: &str,
    available: &[ModelInfo],
    exclude_model: Option<&str>,
) -> ModelChoice {
    let tiers = model_tiers();
    let mut reasons = Vec::new();
    let target_rank = tier_rank(tier);

    let mut candidate_tiers: Vec<&str> = TIER_ORDER.to_vec();
    candidate_tiers.sort_by_key(|t| (tier_rank(t) - target_rank).abs());

    for candidate_tier in candidate_tiers {
        let Some(preferred_ids) = tiers.get(candidate_tier) else { continue };
        for preferred_id in preferred_ids {
            if let Some(model) = available.iter().find(|m| {
                m.id.contains(preferred_id) && exclude_model != Some(m.id.as_str())
            }) {
                if candidate_tier != tier {
                    reasons.push(format!(
                        "No {tier} tier model available, falling back to {candidate_tier}"
                    ));
                }
                reasons.push(format!("Selected {} for {candidate_tier} tier", model.id));
                return ModelChoice {
                    model_id: model.id.clone(),
                    model_name: model.name.clone(),
                    tier: candidate_tier.to_string(),
                    reasons,
                    available_models: available.to_vec(),
                };
            }
        }
    }

    reasons.push("No matching model discovered, defaulting to auto-selection".to_string());
    ModelChoice {
        model_id: "auto".to_string(),
        model_name: "auto".to_string(),
        tier: tier.to_string(),
        reasons,
        available_models: available.to_vec(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Vec<ModelInfo> {
        vec![
            ModelInfo { id: "claude-opus-4-20250601".into(), name: "Claude Opus 4".into() },
            ModelInfo { id: "claude-sonnet-4-20250601".into(), name: "Claude Sonnet 4".into() },
            ModelInfo { id: "gpt-4o-mini".into(), name: "GPT-4o mini".into() },
        ]
    }

    #[test]
    fn parses_id_name_lines_and_skips_noise() {
        let stdout = "Available models:\n\
             Tip: use --model <id>\n\
             claude-opus-4-20250601 - Claude Opus 4 (default)\n\
             \n\
             gpt-4o-mini - GPT-4o mini (current)\n";
        let parsed = parse_model_list(stdout);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "claude-opus-4-20250601");
        assert!(!parsed[0].name.contains("(default)"));
    }

    #[test]
    fn strips_ansi_escapes() {
        let line = "\u{1b}[32mclaude-opus-4-20250601 - Claude Opus 4\u{1b}[0m";
        let parsed = parse_model_list(line);
        assert_eq!(parsed[0].id, "claude-opus-4-20250601");
    }

    #[test]
    fn selects_exact_tier_when_available() {
        let choice = select_model("xhigh", &models(), None);
        assert_eq!(choice.tier, "xhigh");
        assert!(choice.model_id.contains("claude-opus-4"));
    }

    #[test]
    fn falls_back_to_adjacent_tier_when_excluded() {
        let choice = select_model("xhigh", &models(), Some("claude-opus-4-20250601"));
        assert_eq!(choice.tier, "high");
        assert!(choice.model_id.contains("claude-sonnet-4"));
    }

    #[test]
    fn falls_back_to_auto_when_nothing_matches() {
        let choice = select_model("xhigh", &[], None);
        assert_eq!(choice.model_id, "auto");
    }
}
