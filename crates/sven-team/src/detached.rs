// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Detached runner: spawns the child agent on a background task and
//! returns immediately, writing one [`DetachedReport`] per run and
//! optionally notifying a chat on completion.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PREVIEW_CHARS: usize = 2000;
const MIN_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetachedReport {
    pub run_id: Uuid,
    pub task: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub completed_at_ms: i64,
    pub stdout_preview: String,
    pub stderr_preview: String,
    pub chat_id: Option<String>,
}

/// Delivers a completion message to a chat once a detached run finishes.
/// Implemented by `sven-channels`; kept here as a narrow seam so this crate
/// doesn't depend on the chat transport stack.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, chat_id: &str, message: &str);
}

pub struct DetachedRunner {
    binary: Option<PathBuf>,
    timeout: Duration,
    notifier: Option<Arc<dyn ChatNotifier>>,
}

impl DetachedRunner {
    pub fn new(
        binary: Option<PathBuf>,
        timeout_secs: u64,
        notifier: Option<Arc<dyn ChatNotifier>>,
    ) -> Self {
        Self {
            binary,
            timeout: Duration::from_secs(timeout_secs.max(MIN_TIMEOUT_SECS)),
            notifier,
        }
    }

    /// Spawn the run in the background and return its `run_id` immediately;
    /// the caller does not await the child agent's completion.
    pub fn spawn(&self, task: String, chat_id: Option<String>) -> Uuid {
        let run_id = Uuid::new_v4();
        let binary = self.binary.clone();
        let timeout = self.timeout;
        let notifier = self.notifier.clone();
        let task_for_run = task.clone();

        tokio::spawn(async move {
            let report = run_detached(run_id, binary, &task_for_run, timeout, chat_id.clone()).await;
            if let Err(e) = persist_report(&report) {
                tracing::error!(error = %e, %run_id, "failed to persist detached report");
            }
            if let (Some(chat_id), Some(notifier)) = (chat_id, &notifier) {
                let message = if report.success {
                    format!("Detached run {run_id} completed:\n{}", report.stdout_preview)
                } else {
                    format!("Detached run {run_id} failed:\n{}", report.stderr_preview)
                };
                notifier.notify(&chat_id, &message).await;
            }
        });

        run_id
    }
}

async fn run_detached(
    run_id: Uuid,
    binary: Option<PathBuf>,
    task: &str,
    timeout: Duration,
    chat_id: Option<String>,
) -> DetachedReport {
    let Some(binary) = binary else {
        return DetachedReport {
            run_id,
            task: task.to_string(),
            success: false,
            exit_code: None,
            completed_at_ms: Utc::now().timestamp_millis(),
            stdout_preview: String::new(),
            stderr_preview: "child agent binary not found".to_string(),
            chat_id,
        };
    };

    let args = vec!["--print".to_string(), task.to_string()];
    match sven_config::invoke_child_agent(&binary, &args, &Default::default(), timeout).await {
        Ok(out) => DetachedReport {
            run_id,
            task: task.to_string(),
            success: out.success(),
            exit_code: out.exit_code,
            completed_at_ms: Utc::now().timestamp_millis(),
            stdout_preview: truncate(&out.stdout, PREVIEW_CHARS),
            stderr_preview: truncate(&out.stderr, PREVIEW_CHARS),
            chat_id,
        },
        Err(e) => DetachedReport {
            run_id,
            task: task.to_string(),
            success: false,
            exit_code: None,
            completed_at_ms: Utc::now().timestamp_millis(),
            stdout_preview: String::new(),
            stderr_preview: e.to_string(),
            chat_id,
        },
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

fn persist_report(report: &DetachedReport) -> Result<(), sven_config::store::StoreError> {
    let path = sven_memory::paths::detached_report_path(&report.run_id.to_string());
    sven_config::store::save(&path, report)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
