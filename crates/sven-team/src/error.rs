// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("child agent binary not found")]
    BinaryNotFound,
    #[error("child agent exited with code {code:?}: {stderr}")]
    SubprocessFailure { code: Option<i32>, stderr: String },
    #[error("child agent timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("store error at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: sven_config::store::StoreError,
    },
}
