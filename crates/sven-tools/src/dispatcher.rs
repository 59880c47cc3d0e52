// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Regex-based extraction of tool calls expressed as natural-language
//! patterns inside a child agent's free-form textual output, and
//! stitching of the executed results back onto that text.
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

use crate::registry::ToolRegistry;
use crate::tool::ToolCall;

/// A tool invocation recovered from prose, in the order it was found.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectedToolCall {
    WebFetch { url: String },
    WebSearch { query: String },
    MemorySearch { query: String },
    Delegate { persona: String, task: String },
    SmartDelegate { task: String },
    Weather { location: String },
    CursorAgent { verb: String, args: String },
}

impl DetectedToolCall {
    fn tool_name(&self) -> &'static str {
        match self {
            DetectedToolCall::WebFetch { .. } => "web_fetch",
            DetectedToolCall::WebSearch { .. } => "web_search",
            DetectedToolCall::MemorySearch { .. } => "memory_search",
            DetectedToolCall::Delegate { .. } => "delegate",
            DetectedToolCall::SmartDelegate { .. } => "smart_delegate",
            DetectedToolCall::Weather { .. } => "weather",
            DetectedToolCall::CursorAgent { .. } => "cursor_agent",
        }
    }

    fn to_tool_call(&self, id: usize) -> ToolCall {
        let args = match self {
            DetectedToolCall::WebFetch { url } => json!({ "url": url }),
            DetectedToolCall::WebSearch { query } => json!({ "query": query }),
            DetectedToolCall::MemorySearch { query } => json!({ "query": query }),
            DetectedToolCall::Delegate { persona, task } => json!({ "persona_id": persona, "task": task }),
            DetectedToolCall::SmartDelegate { task } => json!({ "task": task }),
            DetectedToolCall::Weather { location } => json!({ "location": location }),
            DetectedToolCall::CursorAgent { verb, args } => json!({ "verb": verb, "args": args }),
        };
        ToolCall { id: format!("dispatch-{id}"), name: self.tool_name().to_string(), args }
    }

    /// The label used in the stitched `[Tool Result: ...]` / `[Tool Error: ...]` block.
    fn label(&self) -> String {
        match self {
            DetectedToolCall::WebFetch { url } => format!("web_fetch for {url}"),
            DetectedToolCall::WebSearch { query } => format!("web_search for '{query}'"),
            DetectedToolCall::MemorySearch { query } => format!("memory_search for '{query}'"),
            DetectedToolCall::Delegate { persona, .. } => return format!("Delegate Result: {persona}"),
            DetectedToolCall::SmartDelegate { .. } => return "Smart Delegate Response".to_string(),
            DetectedToolCall::Weather { location } => format!("weather for {location}"),
            DetectedToolCall::CursorAgent { verb, .. } => format!("cursor_agent {verb}"),
        }
    }

    fn content_cap(&self) -> usize {
        match self {
            DetectedToolCall::WebFetch { .. } => 500,
            DetectedToolCall::Delegate { .. } => 4000,
            DetectedToolCall::SmartDelegate { .. } => 6000,
            DetectedToolCall::CursorAgent { .. } => 3000,
            _ => 2000,
        }
    }
}

/// Strip whitespace, one layer of surrounding quotes, and trailing
/// `.,;:!?)`, then drop a single leading `for `/`about `/`on ` prefix.
/// Returns `None` for a cleaned query shorter than 3 characters.
pub fn clean_query(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        s = &s[1..s.len() - 1];
    }
    let s = s.trim_end_matches(|c: char| ".,;:!?)".contains(c)).trim();
    let lower = s.to_ascii_lowercase();
    let s = if let Some(rest) = lower.strip_prefix("for ") {
        &s[s.len() - rest.len()..]
    } else if let Some(rest) = lower.strip_prefix("about ") {
        &s[s.len() - rest.len()..]
    } else if let Some(rest) = lower.strip_prefix("on ") {
        &s[s.len() - rest.len()..]
    } else {
        s
    };
    let s = s.trim();
    if s.chars().count() < 3 {
        None
    } else {
        Some(s.to_string())
    }
}

macro_rules! lazy_regex {
    ($name:ident, $pat:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pat).unwrap());
    };
}

lazy_regex!(URL_RE, r"https?://[^\s)]+");
lazy_regex!(
    WEB_SEARCH_RE,
    r#"(?i)search (?:the web )?for ["']?([^"'\n.!?]{3,100})["']?|looking up ["']?([^"'\n.!?]{3,100})["']?|find(?:ing)? ["']?([^"'\n.!?]{3,100})["']?"#
);
lazy_regex!(
    MEMORY_SEARCH_RE,
    r#"(?i)search memory for ["']?([^"'\n.!?]{3,100})["']?|look in memory for ["']?([^"'\n.!?]{3,100})["']?"#
);
lazy_regex!(
    DELEGATE_RE,
    r#"(?i)delegate to (researcher|coder|reviewer|writer|home_assistant|ha):\s*([^\n]{3,500})"#
);
lazy_regex!(
    SMART_DELEGATE_RE,
    r#"(?i)smart delegate:\s*([^\n]{3,500})|delegate to (?:stronger|better|optimal) model:\s*([^\n]{3,500})"#
);
lazy_regex!(
    WEATHER_RE,
    r#"(?i)(?:weather|forecast) (?:in|for|at) ([A-Za-z][A-Za-z .'-]{1,60})"#
);
// Matches any verb word, not just the recognized ones — an unrecognized verb
// is still detected and dispatched so the tool reports it as a proper tool
// error instead of the text silently passing through untouched.
lazy_regex!(CURSOR_AGENT_RE, r#"(?i)cursor agent ([a-z_]+)(?::\s*([^\n]{0,500}))?"#);

struct Found {
    pos: usize,
    call: DetectedToolCall,
}

/// Detect all tool-call patterns in `text`, applying the per-tool
/// per-response caps, and return them in the order they appear.
pub fn detect(text: &str) -> Vec<DetectedToolCall> {
    let mut found = Vec::new();

    for (i, m) in URL_RE.find_iter(text).take(3).enumerate() {
        let _ = i;
        found.push(Found { pos: m.start(), call: DetectedToolCall::WebFetch { url: m.as_str().to_string() } });
    }

    let mut web_search_count = 0;
    for caps in WEB_SEARCH_RE.captures_iter(text) {
        if web_search_count >= 2 {
            break;
        }
        let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        if let Some(m) = raw {
            if let Some(q) = clean_query(m.as_str()) {
                found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::WebSearch { query: q } });
                web_search_count += 1;
            }
        }
    }

    let mut memory_count = 0;
    for caps in MEMORY_SEARCH_RE.captures_iter(text) {
        if memory_count >= 2 {
            break;
        }
        let raw = caps.get(1).or_else(|| caps.get(2));
        if let Some(m) = raw {
            if let Some(q) = clean_query(m.as_str()) {
                found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::MemorySearch { query: q } });
                memory_count += 1;
            }
        }
    }

    if let Some(caps) = DELEGATE_RE.captures(text) {
        let persona = caps.get(1).unwrap().as_str().to_ascii_lowercase();
        let persona = if persona == "ha" { "home_assistant".to_string() } else { persona };
        let task = caps.get(2).unwrap().as_str().trim().to_string();
        if !task.is_empty() {
            found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::Delegate { persona, task } });
        }
    }

    if let Some(caps) = SMART_DELEGATE_RE.captures(text) {
        let task = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().trim().to_string());
        if let Some(task) = task.filter(|t| !t.is_empty()) {
            found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::SmartDelegate { task } });
        }
    }

    if let Some(caps) = WEATHER_RE.captures(text) {
        let location = caps.get(1).unwrap().as_str().trim().to_string();
        found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::Weather { location } });
    }

    if let Some(caps) = CURSOR_AGENT_RE.captures(text) {
        let verb = caps.get(1).unwrap().as_str().to_ascii_lowercase();
        let args = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        found.push(Found { pos: caps.get(0).unwrap().start(), call: DetectedToolCall::CursorAgent { verb, args } });
    }

    found.sort_by_key(|f| f.pos);
    found.into_iter().map(|f| f.call).collect()
}

/// Append a single truncated line `"User asked: " + first_line[:350]` to a
/// delegated task, per the delegation-context-minimization rule. Nothing
/// else from history is forwarded.
pub fn minimize_delegation_context(task: &str, last_user_message: Option<&str>) -> String {
    match last_user_message {
        None => task.to_string(),
        Some(msg) => {
            let first_line = msg.lines().next().unwrap_or("");
            let truncated: String = first_line.chars().take(350).collect();
            format!("{task}\nUser asked: {truncated}")
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}...")
    }
}

/// Execute every detected tool call through `registry` and append a
/// `[Tool Result: ...]` or `[Tool Error: ...]` block per call to `text`, in
/// detection order. Returns the augmented text and the raw per-call
/// outputs.
pub async fn dispatch(
    text: &str,
    registry: &ToolRegistry,
    last_user_message: Option<&str>,
) -> (String, Vec<crate::tool::ToolOutput>) {
    let mut calls = detect(text);
    for call in &mut calls {
        if let DetectedToolCall::Delegate { task, .. } = call {
            *task = minimize_delegation_context(task, last_user_message);
        }
        if let DetectedToolCall::SmartDelegate { task } = call {
            *task = minimize_delegation_context(task, last_user_message);
        }
    }

    let mut augmented = text.to_string();
    let mut outputs = Vec::new();

    for (i, call) in calls.iter().enumerate() {
        let tool_call = call.to_tool_call(i);
        let output = registry.execute(&tool_call).await;
        let label = call.label();
        let cap = call.content_cap();
        let body = truncate(&output.content, cap);
        let block = if output.is_error {
            format!("\n\n[Tool Error: {label}]\n{body}")
        } else {
            format!("\n\n[Tool Result: {label}]\n{body}")
        };
        augmented.push_str(&block);
        outputs.push(output);
    }

    (augmented, outputs)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_query_strips_quotes_and_punctuation() {
        assert_eq!(clean_query("\"cats\"."), Some("cats".to_string()));
        assert_eq!(clean_query("  rust programming!  "), Some("rust programming".to_string()));
    }

    #[test]
    fn clean_query_strips_leading_for() {
        assert_eq!(clean_query("for the weather"), Some("the weather".to_string()));
    }

    #[test]
    fn clean_query_rejects_short_results() {
        assert_eq!(clean_query("hi"), None);
        assert_eq!(clean_query("a"), None);
    }

    #[test]
    fn detects_web_fetch_url() {
        let calls = detect("Let me fetch https://example.com now.");
        assert_eq!(calls, vec![DetectedToolCall::WebFetch { url: "https://example.com".to_string() }]);
    }

    #[test]
    fn url_with_trailing_colon_colon_is_not_a_smiley() {
        // Ensures the URL scheme `://` isn't mangled; dispatch only extracts URLs, never
        // touches smiley substitution (that lives in the chat front-end).
        let calls = detect("see https://example.com/path");
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn detects_web_search_and_web_fetch_in_order() {
        let calls = detect("Let me fetch https://example.com and also search the web for 'cats'.");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], DetectedToolCall::WebFetch { url: "https://example.com".to_string() });
        assert_eq!(calls[1], DetectedToolCall::WebSearch { query: "cats".to_string() });
    }

    #[test]
    fn web_fetch_caps_at_three() {
        let text = "https://a.com https://b.com https://c.com https://d.com";
        let calls = detect(text);
        assert_eq!(calls.len(), 3);
    }

    #[test]
    fn detects_memory_search() {
        let calls = detect("I will search memory for project deadlines.");
        assert!(matches!(&calls[0], DetectedToolCall::MemorySearch { query } if query == "project deadlines"));
    }

    #[test]
    fn detects_delegate_with_ha_alias() {
        let calls = detect("delegate to ha: turn off the lights");
        assert_eq!(calls[0], DetectedToolCall::Delegate { persona: "home_assistant".into(), task: "turn off the lights".into() });
    }

    #[test]
    fn detects_smart_delegate() {
        let calls = detect("smart delegate: design a new payment system");
        assert_eq!(calls[0], DetectedToolCall::SmartDelegate { task: "design a new payment system".into() });
    }

    #[test]
    fn detects_weather() {
        let calls = detect("what's the weather in Berlin today");
        assert_eq!(calls[0], DetectedToolCall::Weather { location: "Berlin today".into() });
    }

    #[test]
    fn detects_cursor_agent_verb_with_args() {
        let calls = detect("cursor agent launch: my task");
        assert_eq!(calls[0], DetectedToolCall::CursorAgent { verb: "launch".into(), args: "my task".into() });
    }

    #[test]
    fn detects_unrecognized_cursor_agent_verb_too() {
        let calls = detect("cursor agent frobnicate: whatever");
        assert_eq!(calls[0], DetectedToolCall::CursorAgent { verb: "frobnicate".into(), args: "whatever".into() });
    }

    #[test]
    fn minimize_delegation_context_appends_truncated_user_line() {
        let out = minimize_delegation_context("do the thing", Some("please help\nmore context"));
        assert_eq!(out, "do the thing\nUser asked: please help");
    }

    #[test]
    fn minimize_delegation_context_without_last_message_is_unchanged() {
        assert_eq!(minimize_delegation_context("task", None), "task");
    }
}
