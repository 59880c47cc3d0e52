// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Durable single-file JSON store with advisory locking and atomic writes.
//!
//! Every piece of persisted state in this workspace (history, tracker,
//! pairings, schedules, ...) goes through [`load`]/[`save`] so the
//! write-temp-then-rename-with-lock discipline lives in exactly one place.
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

const LOCK_POLL: Duration = Duration::from_millis(25);
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not acquire lock on {0} within {1:?}")]
    LockTimeout(PathBuf, Duration),
}

fn lock_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

/// Acquire an OS advisory exclusive lock on the sibling `.lock` file,
/// retrying with a bounded poll when another process already holds it. The
/// holder's PID is written into the lock file to aid diagnosis.
struct FileLock {
    path: PathBuf,
    file: std::fs::File,
}

impl FileLock {
    fn acquire(target: &Path) -> Result<Self, StoreError> {
        let path = lock_path(target);
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| StoreError::Io { path: path.clone(), source: e })?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    use std::io::{Seek, SeekFrom, Write};
                    let mut f = &file;
                    let _ = f.set_len(0);
                    let _ = f.seek(SeekFrom::Start(0));
                    let _ = write!(f, "{}", std::process::id());
                    return Ok(Self { path, file });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(StoreError::LockTimeout(target.to_path_buf(), LOCK_TIMEOUT));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(StoreError::Io {
                        path: path.clone(),
                        source: e,
                    })
                }
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Load a JSON store. A missing file yields `T::default()`. A corrupt file
/// (decode error) is treated as empty and never propagated as an error.
pub fn load<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store decode error, treating as empty");
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

/// Atomically write a JSON store: acquire the sibling `.lock`, write to a
/// `<path>.<pid>.<random>.tmp` sibling, fsync, then rename over the target.
/// Mode 0600 on unix.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let _lock = FileLock::acquire(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("store"),
        std::process::id(),
        uuid::Uuid::new_v4().simple(),
    );
    let tmp_path = path.with_file_name(tmp_name);

    let json = serde_json::to_vec_pretty(value).expect("serializing store value");
    {
        let file = std::fs::File::create(&tmp_path).map_err(|e| StoreError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(std::fs::Permissions::from_mode(0o600));
        }
        use std::io::Write;
        let mut file = file;
        file.write_all(&json).map_err(|e| StoreError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        file.sync_all().map_err(|e| StoreError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Same as [`save`] but also `fsync`s the containing directory and reads the
/// file back to verify the write landed, for call sites that need the
/// stronger durability guarantee (e.g. pairing approval).
pub fn save_verified<T: Serialize + DeserializeOwned + PartialEq>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    save(path, value)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    let reread: T = load(path);
    if reread != *value {
        warn!(path = %path.display(), "store verification read-back mismatch");
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        n: u32,
        s: String,
    }

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let v: Dummy = load(&path);
        assert_eq!(v, Dummy::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let value = Dummy { n: 7, s: "hi".into() };
        save(&path, &value).unwrap();
        let reread: Dummy = load(&path);
        assert_eq!(reread, value);
    }

    #[test]
    fn corrupt_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{not json").unwrap();
        let v: Dummy = load(&path);
        assert_eq!(v, Dummy::default());
    }

    #[test]
    fn save_cleans_up_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        save(&path, &Dummy::default()).unwrap();
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn save_verified_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let value = Dummy { n: 1, s: "a".into() };
        save_verified(&path, &value).unwrap();
        let reread: Dummy = load(&path);
        assert_eq!(reread, value);
    }
}
