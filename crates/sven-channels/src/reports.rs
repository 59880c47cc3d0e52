// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Rendering for the built-in `/reports` and `/status` commands: listing
//! recent [`sven_team::detached::DetachedReport`]s and summarizing the
//! [`sven_team::Tracker`]'s execution counts.
use std::cmp::Reverse;

use sven_team::detached::DetachedReport;
use sven_team::Tracker;

const MAX_REPORTS_LISTED: usize = 10;

/// Load every persisted detached report, most recently completed first,
/// truncated to [`MAX_REPORTS_LISTED`]. Unreadable/corrupt report files are
/// skipped rather than failing the whole listing.
pub fn recent_detached_reports() -> Vec<DetachedReport> {
    let dir = sven_memory::paths::detached_reports_dir();
    let mut reports: Vec<DetachedReport> = match std::fs::read_dir(&dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| {
                let bytes = std::fs::read(e.path()).ok()?;
                serde_json::from_slice(&bytes).ok()
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    reports.sort_by_key(|r: &DetachedReport| Reverse(r.completed_at_ms));
    reports.truncate(MAX_REPORTS_LISTED);
    reports
}

/// Render the `/reports` command body as Telegram-flavored markdown (passed
/// through [`crate::format::render_html`] by the caller, same as any other
/// outgoing chat message).
pub fn render_reports(reports: &[DetachedReport]) -> String {
    if reports.is_empty() {
        return "No detached runs yet.".to_string();
    }
    let mut out = String::from("**Recent detached runs:**\n\n");
    for report in reports {
        let status = if report.success { "done" } else { "failed" };
        out.push_str(&format!("- `{}` [{status}] {}\n", report.run_id, truncate(&report.task, 80)));
    }
    out
}

/// Render the `/status` command body from tracker stats plus active
/// executions' task previews.
pub async fn render_status(tracker: &Tracker) -> String {
    let stats = tracker.get_stats().await;
    let active = tracker.active_executions().await;
    let mut out = format!(
        "**Sub-agent status**\n\ntotal: {}\nactive: {}\ncompleted: {}\nfailed: {}\ntimeout: {}\n",
        stats.total_executions, stats.active_executions, stats.completed_executions, stats.failed_executions, stats.timeout_executions
    );
    if !active.is_empty() {
        out.push_str("\n**Running now:**\n");
        for record in &active {
            let task = record.task.as_deref().unwrap_or("(no task)");
            out.push_str(&format!("- {} — {}\n", record.tool_name, truncate(task, 60)));
        }
    }
    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_report(task: &str, success: bool, completed_at_ms: i64) -> DetachedReport {
        DetachedReport {
            run_id: Uuid::new_v4(),
            task: task.to_string(),
            success,
            exit_code: Some(0),
            completed_at_ms,
            stdout_preview: String::new(),
            stderr_preview: String::new(),
            chat_id: None,
        }
    }

    #[test]
    fn render_reports_empty_list() {
        assert_eq!(render_reports(&[]), "No detached runs yet.");
    }

    #[test]
    fn render_reports_lists_status_and_truncated_task() {
        let reports = vec![sample_report("do the thing", true, 1), sample_report("broken task", false, 2)];
        let out = render_reports(&reports);
        assert!(out.contains("[done]"));
        assert!(out.contains("[failed]"));
    }

    #[tokio::test]
    async fn render_status_reports_tracker_counts() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().join("tracker.json"));
        let id = tracker.start_execution("delegate", Some("task".into()), None, None, None).await;
        tracker.update_status(id, sven_team::tracker::ExecutionStatus::Completed, None).await;
        let out = render_status(&tracker).await;
        assert!(out.contains("total: 1"));
    }
}
