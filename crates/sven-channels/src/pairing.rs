// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Durable pairing state: which chat ids are authorized to drive the agent,
//! and which are mid-pairing with a freshly issued code. Matching a code is
//! always case-insensitive; storage keeps the code as generated.
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sven_config::store::StoreError;
use sven_memory::paths::telegram_pairings_path;
use uuid::Uuid;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairingState {
    pub paired_users: HashSet<i64>,
    pub pending_pairings: HashMap<String, String>,
}

/// Derive a six-character upper-alphanumeric code from fresh randomness
/// without pulling in a dedicated RNG crate: a v4 UUID is already
/// cryptographically random, so its bytes are simply mapped onto the code
/// alphabet.
fn generate_code() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    bytes.iter().take(CODE_LEN).map(|b| CODE_ALPHABET[*b as usize % CODE_ALPHABET.len()] as char).collect()
}

impl PairingState {
    pub fn is_paired(&self, chat_id: i64) -> bool {
        self.paired_users.contains(&chat_id)
    }

    /// Issue (or re-issue) a pairing code for an unpaired chat.
    pub fn start_pairing(&mut self, chat_id: i64) -> String {
        let code = generate_code();
        self.pending_pairings.insert(chat_id.to_string(), code.clone());
        code
    }

    /// Approve a pending pairing by code, case-insensitively. On success the
    /// chat moves from `pending_pairings` to `paired_users` and its code is
    /// removed; returns the newly paired chat id.
    pub fn approve(&mut self, code: &str) -> Option<i64> {
        let upper = code.to_ascii_uppercase();
        let chat_id_str = self
            .pending_pairings
            .iter()
            .find(|(_, c)| c.to_ascii_uppercase() == upper)
            .map(|(chat, _)| chat.clone())?;
        self.pending_pairings.remove(&chat_id_str);
        let chat_id: i64 = chat_id_str.parse().ok()?;
        self.paired_users.insert(chat_id);
        Some(chat_id)
    }
}

pub fn load() -> PairingState {
    sven_config::store::load(&telegram_pairings_path())
}

/// Persist with the stronger fsync-and-verify write path: pairing approval
/// is the one store write the base spec calls out as needing a forced full
/// `fsync` before the atomic rename.
pub fn save(state: &PairingState) -> Result<(), StoreError> {
    sven_config::store::save_verified(&telegram_pairings_path(), state)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_pairing_issues_six_char_upper_alphanumeric_code() {
        let mut state = PairingState::default();
        let code = state.start_pairing(42);
        assert_eq!(code.chars().count(), CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn approve_matches_case_insensitively_and_moves_chat_to_paired() {
        let mut state = PairingState::default();
        let code = state.start_pairing(42);
        let approved = state.approve(&code.to_ascii_lowercase());
        assert_eq!(approved, Some(42));
        assert!(state.is_paired(42));
        assert!(state.pending_pairings.is_empty());
    }

    #[test]
    fn approve_unknown_code_is_a_no_op() {
        let mut state = PairingState::default();
        state.start_pairing(42);
        assert_eq!(state.approve("ZZZZZZ"), None);
        assert!(!state.is_paired(42));
    }

    #[test]
    fn unpaired_chat_is_not_paired() {
        let state = PairingState::default();
        assert!(!state.is_paired(1));
    }
}
