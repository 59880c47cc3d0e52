// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Allocation and durable state for "new"-prefix chat messages: each gets
//! a fresh-context child-agent run addressable later by a stable numeric
//! code via `/re <code>`.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sven_config::store::StoreError;
use sven_memory::paths::new_thread_agents_path;

const FIRST_CODE: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewThreadAgent {
    pub agent_code: i64,
    pub task: String,
    pub chat_id: String,
    pub user_id: String,
    pub started_at: String,
    pub last_response: Option<String>,
    pub last_response_at: Option<String>,
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewThreadAgentStore {
    #[serde(default = "first_code")]
    pub next_code: i64,
    #[serde(default)]
    pub agents: Vec<NewThreadAgent>,
}

fn first_code() -> i64 {
    FIRST_CODE
}

impl NewThreadAgentStore {
    /// Allocate the next monotonically increasing code and record a running
    /// agent for it. Codes are never reused or renumbered even if the
    /// record is later inspected or cleaned up externally.
    pub fn allocate(&mut self, task: String, chat_id: String, user_id: String) -> i64 {
        if self.next_code < FIRST_CODE {
            self.next_code = FIRST_CODE;
        }
        let code = self.next_code;
        self.next_code += 1;
        self.agents.push(NewThreadAgent {
            agent_code: code,
            task,
            chat_id,
            user_id,
            started_at: Utc::now().to_rfc3339(),
            last_response: None,
            last_response_at: None,
            status: AgentStatus::Running,
        });
        code
    }

    pub fn get(&self, code: i64) -> Option<&NewThreadAgent> {
        self.agents.iter().find(|a| a.agent_code == code)
    }

    /// Record a completed run's response against its code.
    pub fn complete(&mut self, code: i64, response: String) {
        if let Some(agent) = self.agents.iter_mut().find(|a| a.agent_code == code) {
            agent.last_response = Some(response);
            agent.last_response_at = Some(Utc::now().to_rfc3339());
            agent.status = AgentStatus::Completed;
        }
    }
}

pub fn load() -> NewThreadAgentStore {
    sven_config::store::load(&new_thread_agents_path())
}

pub fn save(store: &NewThreadAgentStore) -> Result<(), StoreError> {
    sven_config::store::save(&new_thread_agents_path(), store)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_start_at_1000_and_increase_monotonically() {
        let mut store = NewThreadAgentStore::default();
        let a = store.allocate("task a".into(), "chat1".into(), "user1".into());
        let b = store.allocate("task b".into(), "chat1".into(), "user1".into());
        let c = store.allocate("task c".into(), "chat1".into(), "user1".into());
        assert_eq!((a, b, c), (1000, 1001, 1002));
    }

    #[test]
    fn allocating_k_agents_yields_a_contiguous_run() {
        let mut store = NewThreadAgentStore::default();
        let codes: Vec<i64> = (0..5).map(|_| store.allocate("t".into(), "c".into(), "u".into())).collect();
        assert_eq!(codes, vec![1000, 1001, 1002, 1003, 1004]);
    }

    #[test]
    fn complete_updates_last_response_and_status() {
        let mut store = NewThreadAgentStore::default();
        let code = store.allocate("task".into(), "c".into(), "u".into());
        store.complete(code, "done".into());
        let agent = store.get(code).unwrap();
        assert_eq!(agent.status, AgentStatus::Completed);
        assert_eq!(agent.last_response.as_deref(), Some("done"));
    }

    #[test]
    fn get_unknown_code_is_none() {
        let store = NewThreadAgentStore::default();
        assert!(store.get(9999).is_none());
    }
}
