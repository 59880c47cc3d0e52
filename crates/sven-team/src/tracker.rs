// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tracks sub-agent executions (Delegate, Smart-Delegate, Detached, Cursor
//! Agent) with persistent state and completion notifications.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Starting,
    Running,
    Thinking,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl ExecutionStatus {
    fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Thinking)
    }

    /// Statuses that set `completed_at` on transition into them.
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout | Self::Cancelled)
    }

    /// Statuses that fire completion-observer callbacks. `Cancelled` sets
    /// `completed_at` above but deliberately does not notify observers.
    fn notifies_completion(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub timestamp_ms: i64,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub tool_name: String,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub task: Option<String>,
    pub model: Option<String>,
    pub status: ExecutionStatus,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    pub response_preview: Option<String>,
    pub error: Option<String>,
    pub progress_updates: Vec<ProgressUpdate>,
    pub complexity_score: Option<f64>,
    pub tier: Option<String>,
}

impl ExecutionRecord {
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.completed_at_ms.unwrap_or_else(|| Utc::now().timestamp_millis());
        (end - self.started_at_ms) as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub tool_name: String,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub task: Option<String>,
    pub model: Option<String>,
    pub status: ExecutionStatus,
    pub started_at_ms: i64,
    pub completed_at_ms: Option<i64>,
    pub elapsed_seconds: f64,
    pub response: Option<String>,
    pub error: Option<String>,
    pub progress_updates: Vec<ProgressUpdate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    pub total_executions: usize,
    pub active_executions: usize,
    pub completed_executions: usize,
    pub failed_executions: usize,
    pub timeout_executions: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackerState {
    executions: HashMap<Uuid, ExecutionRecord>,
}

/// Observer notified exactly once per execution, on its first transition
/// into a terminal, non-cancelled status.
#[async_trait]
pub trait CompletionObserver: Send + Sync {
    async fn on_completion(&self, execution: &ExecutionRecord);
}

pub struct Tracker {
    state_path: std::path::PathBuf,
    state: Mutex<TrackerState>,
    observers: Mutex<Vec<Arc<dyn CompletionObserver>>>,
    completion_tx: mpsc::UnboundedSender<Uuid>,
}

impl Tracker {
    /// Build a tracker over `state_path`, loading any persisted executions,
    /// and spawn the background worker that drains completion signals into
    /// registered observers.
    pub fn new(state_path: std::path::PathBuf) -> Arc<Self> {
        let state: TrackerState = sven_config::store::load(&state_path);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(Self {
            state_path,
            state: Mutex::new(state),
            observers: Mutex::new(Vec::new()),
            completion_tx,
        });
        tokio::spawn(completion_worker(tracker.clone(), completion_rx));
        tracker
    }

    pub async fn register_completion_observer(&self, observer: Arc<dyn CompletionObserver>) {
        self.observers.lock().await.push(observer);
    }

    fn persist(&self, state: &TrackerState) {
        if let Err(e) = sven_config::store::save(&self.state_path, state) {
            tracing::error!(error = %e, path = %self.state_path.display(), "failed to persist tracker state");
        }
    }

    pub async fn start_execution(
        &self,
        tool_name: &str,
        task: Option<String>,
        model: Option<String>,
        complexity_score: Option<f64>,
        tier: Option<String>,
    ) -> Uuid {
        let execution_id = Uuid::new_v4();
        let record = ExecutionRecord {
            execution_id,
            tool_name: tool_name.to_string(),
            agent_id: None,
            agent_name: None,
            task,
            model,
            status: ExecutionStatus::Starting,
            started_at_ms: Utc::now().timestamp_millis(),
            completed_at_ms: None,
            response_preview: None,
            error: None,
            progress_updates: Vec::new(),
            complexity_score,
            tier,
        };

        let mut state = self.state.lock().await;
        state.executions.insert(execution_id, record);
        self.persist(&state);
        execution_id
    }

    pub async fn update_status(&self, execution_id: Uuid, status: ExecutionStatus, error: Option<String>) {
        let mut state = self.state.lock().await;
        let Some(record) = state.executions.get_mut(&execution_id) else {
            tracing::warn!(%execution_id, "execution not found for status update");
            return;
        };

        let old_status = record.status;
        record.status = status;
        if status.is_terminal() {
            record.completed_at_ms = Some(Utc::now().timestamp_millis());
        }
        if let Some(err) = error {
            record.error = Some(err);
        }
        self.persist(&state);

        if old_status != status && status.notifies_completion() {
            let _ = self.completion_tx.send(execution_id);
        }
    }

    pub async fn add_progress_update(&self, execution_id: Uuid, message: String, metadata: Option<serde_json::Value>) {
        let mut state = self.state.lock().await;
        let Some(record) = state.executions.get_mut(&execution_id) else {
            tracing::warn!(%execution_id, "execution not found for progress update");
            return;
        };
        record.progress_updates.push(ProgressUpdate {
            timestamp_ms: Utc::now().timestamp_millis(),
            message,
            metadata,
        });
        self.persist(&state);
    }

    pub async fn set_response_preview(&self, execution_id: Uuid, preview: String) {
        let mut state = self.state.lock().await;
        let Some(record) = state.executions.get_mut(&execution_id) else {
            return;
        };
        record.response_preview = Some(preview);
        self.persist(&state);
    }

    pub async fn update_execution_meta(&self, execution_id: Uuid, agent_id: Option<String>, agent_name: Option<String>) {
        let mut state = self.state.lock().await;
        let Some(record) = state.executions.get_mut(&execution_id) else {
            return;
        };
        if agent_id.is_some() {
            record.agent_id = agent_id;
        }
        if agent_name.is_some() {
            record.agent_name = agent_name;
        }
        self.persist(&state);
    }

    pub async fn get(&self, execution_id: Uuid) -> Option<ExecutionRecord> {
        self.state.lock().await.executions.get(&execution_id).cloned()
    }

    pub async fn list(&self, tool_name: Option<&str>, limit: Option<usize>) -> Vec<ExecutionRecord> {
        let state = self.state.lock().await;
        let mut executions: Vec<ExecutionRecord> = state
            .executions
            .values()
            .filter(|e| tool_name.map(|t| e.tool_name == t).unwrap_or(true))
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        if let Some(limit) = limit {
            executions.truncate(limit);
        }
        executions
    }

    pub async fn active_executions(&self) -> Vec<ExecutionRecord> {
        let state = self.state.lock().await;
        let mut executions: Vec<ExecutionRecord> = state
            .executions
            .values()
            .filter(|e| e.status.is_active())
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        executions
    }

    pub async fn get_stats(&self) -> TrackerStats {
        let state = self.state.lock().await;
        let mut stats = TrackerStats::default();
        stats.total_executions = state.executions.len();
        for e in state.executions.values() {
            match e.status {
                ExecutionStatus::Starting | ExecutionStatus::Running | ExecutionStatus::Thinking => {
                    stats.active_executions += 1
                }
                ExecutionStatus::Completed => stats.completed_executions += 1,
                ExecutionStatus::Failed => stats.failed_executions += 1,
                ExecutionStatus::Timeout => stats.timeout_executions += 1,
                ExecutionStatus::Cancelled => {}
            }
        }
        stats
    }

    pub async fn get_result(&self, execution_id: Uuid) -> Option<ExecutionResult> {
        let record = self.get(execution_id).await?;
        Some(ExecutionResult {
            execution_id: record.execution_id,
            tool_name: record.tool_name,
            agent_id: record.agent_id,
            agent_name: record.agent_name,
            task: record.task,
            model: record.model,
            status: record.status,
            started_at_ms: record.started_at_ms,
            completed_at_ms: record.completed_at_ms,
            elapsed_seconds: record.elapsed_seconds(),
            response: record.response_preview,
            error: record.error,
            progress_updates: record.progress_updates,
        })
    }
}

/// Drains completion signals and fans each out to every registered
/// observer, matching the "message passing over inline callbacks" design
/// this tracker intentionally departs from its Python ancestor on.
async fn completion_worker(tracker: Arc<Tracker>, mut rx: mpsc::UnboundedReceiver<Uuid>) {
    while let Some(execution_id) = rx.recv().await {
        let Some(record) = tracker.get(execution_id).await else {
            continue;
        };
        let observers = tracker.observers.lock().await.clone();
        for observer in observers {
            observer.on_completion(&record).await;
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver(Arc<AtomicUsize>);

    #[async_trait]
    impl CompletionObserver for CountingObserver {
        async fn on_completion(&self, _execution: &ExecutionRecord) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn start_and_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().join("tracker.json"));
        let id = tracker.start_execution("delegate", Some("hi".into()), None, None, None).await;
        let record = tracker.get(id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Starting);
        assert_eq!(record.tool_name, "delegate");
    }

    #[tokio::test]
    async fn completion_fires_observer_once() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().join("tracker.json"));
        let count = Arc::new(AtomicUsize::new(0));
        tracker.register_completion_observer(Arc::new(CountingObserver(count.clone()))).await;

        let id = tracker.start_execution("delegate", None, None, None, None).await;
        tracker.update_status(id, ExecutionStatus::Running, None).await;
        tracker.update_status(id, ExecutionStatus::Completed, None).await;
        tracker.update_status(id, ExecutionStatus::Completed, None).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_sets_completed_at_but_does_not_notify() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().join("tracker.json"));
        let count = Arc::new(AtomicUsize::new(0));
        tracker.register_completion_observer(Arc::new(CountingObserver(count.clone()))).await;

        let id = tracker.start_execution("delegate", None, None, None, None).await;
        tracker.update_status(id, ExecutionStatus::Cancelled, None).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let record = tracker.get(id).await.unwrap();
        assert!(record.completed_at_ms.is_some());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().join("tracker.json"));
        let a = tracker.start_execution("delegate", None, None, None, None).await;
        let b = tracker.start_execution("delegate", None, None, None, None).await;
        tracker.update_status(a, ExecutionStatus::Completed, None).await;
        tracker.update_status(b, ExecutionStatus::Failed, Some("boom".into())).await;

        let stats = tracker.get_stats().await;
        assert_eq!(stats.total_executions, 2);
        assert_eq!(stats.completed_executions, 1);
        assert_eq!(stats.failed_executions, 1);
    }

    #[tokio::test]
    async fn state_persists_across_tracker_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        let id = {
            let tracker = Tracker::new(path.clone());
            tracker.start_execution("delegate", Some("task".into()), None, None, None).await
        };
        let tracker2 = Tracker::new(path);
        assert!(tracker2.get(id).await.is_some());
    }
}
