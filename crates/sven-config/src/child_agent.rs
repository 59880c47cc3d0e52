// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Resolution and invocation of the external child-agent CLI binary.
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Configuration fields relevant to locating and invoking the child agent.
/// A strict subset of [`crate::EnhancedConfig`] so callers can pass either.
pub trait ChildAgentConfig {
    fn cursor_agent_path(&self) -> Option<&str>;
}

/// Resolve the child-agent binary path: `CURSOR_AGENT_PATH` env var, then
/// config, then `~/.local/bin/cursor-agent`, then a `PATH` lookup.
/// Returns `None` if no candidate exists on disk.
pub fn resolve_path(config: &impl ChildAgentConfig) -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CURSOR_AGENT_PATH") {
        if !p.is_empty() {
            let expanded = shellexpand::tilde(&p).into_owned();
            let path = PathBuf::from(expanded);
            return path.exists().then_some(path);
        }
    }
    if let Some(p) = config.cursor_agent_path() {
        let expanded = shellexpand::tilde(p).into_owned();
        let path = PathBuf::from(expanded);
        return path.exists().then_some(path);
    }
    if let Some(home) = dirs::home_dir() {
        let default = home.join(".local/bin/cursor-agent");
        if default.exists() {
            return Some(default);
        }
    }
    which_on_path("cursor-agent")
}

fn which_on_path(bin: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(bin);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Outcome of a single child-agent subprocess invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildAgentOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ChildAgentOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Spawn the resolved child-agent binary with the given args and extra
/// environment variables, bounded by `timeout`. Never blocks the async
/// runtime's event loop: the subprocess wait is itself an async suspension
/// point.
pub async fn invoke(
    binary: &std::path::Path,
    args: &[String],
    env: &HashMap<String, String>,
    timeout: Duration,
) -> std::io::Result<ChildAgentOutput> {
    let mut cmd = Command::new(binary);
    cmd.args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    let fut = cmd.output();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(output)) => Ok(ChildAgentOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(ChildAgentOutput {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct NoPath;
    impl ChildAgentConfig for NoPath {
        fn cursor_agent_path(&self) -> Option<&str> {
            None
        }
    }

    struct WithPath(String);
    impl ChildAgentConfig for WithPath {
        fn cursor_agent_path(&self) -> Option<&str> {
            Some(&self.0)
        }
    }

    #[test]
    fn env_var_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("cursor-agent");
        std::fs::write(&bin, b"#!/bin/sh\n").unwrap();
        std::env::set_var("CURSOR_AGENT_PATH", bin.to_str().unwrap());
        let resolved = resolve_path(&WithPath("/nonexistent/cursor-agent".into()));
        assert_eq!(resolved, Some(bin));
        std::env::remove_var("CURSOR_AGENT_PATH");
    }

    #[test]
    fn missing_binary_resolves_to_none_without_config_or_path_hit() {
        std::env::remove_var("CURSOR_AGENT_PATH");
        let resolved = resolve_path(&NoPath);
        // best-effort: either None, or a real cursor-agent happens to be on PATH
        if let Some(p) = &resolved {
            assert!(p.exists());
        }
    }

    #[tokio::test]
    async fn invoke_reports_timeout() {
        let out = invoke(
            std::path::Path::new("/bin/sleep"),
            &["2".into()],
            &HashMap::new(),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn invoke_captures_exit_code_and_stdout() {
        let out = invoke(
            std::path::Path::new("/bin/echo"),
            &["hello".into()],
            &HashMap::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }
}
