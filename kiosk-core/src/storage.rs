//! Durable client flags
//!
//! A handful of boolean flags must outlive a full reload of the display
//! (the "refreshing" marker and the reload overlay). Each flag has exactly
//! one writer: the dispatcher sets them, session bootstrap clears them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the flag store inside the client state directory
pub const FLAGS_FILE: &str = "flags.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write flags: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to encode flags: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Typed keys of the durable store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// A `refresh` command was applied and the display is reloading
    Refreshing,
    /// The full-screen reload overlay was injected
    ReloadOverlay,
}

#[derive(Debug)]
enum Backend {
    Memory,
    File(PathBuf),
}

/// Small typed key-value store with explicit get/set/clear
#[derive(Debug, Clone)]
pub struct FlagStore {
    backend: Arc<Backend>,
    flags: Arc<Mutex<BTreeMap<Flag, bool>>>,
}

impl FlagStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory),
            flags: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Store persisted as JSON in `dir`. Missing or unreadable files start empty
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(FLAGS_FILE);
        let flags = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt flag store {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read flag store {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            backend: Arc::new(Backend::File(path)),
            flags: Arc::new(Mutex::new(flags)),
        }
    }

    pub fn get(&self, flag: Flag) -> bool {
        self.lock().get(&flag).copied().unwrap_or(false)
    }

    pub fn set(&self, flag: Flag, value: bool) -> Result<(), StorageError> {
        let mut flags = self.lock();
        if value {
            flags.insert(flag, true);
        } else {
            flags.remove(&flag);
        }
        self.persist(&flags)
    }

    pub fn clear(&self, flag: Flag) -> Result<(), StorageError> {
        self.set(flag, false)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Flag, bool>> {
        // Nothing panics while holding the guard, so recover rather than propagate poison
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, flags: &BTreeMap<Flag, bool>) -> Result<(), StorageError> {
        let Backend::File(ref path) = *self.backend else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(flags)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_get_set_clear() {
        let store = FlagStore::in_memory();
        assert!(!store.get(Flag::Refreshing));

        store.set(Flag::Refreshing, true).unwrap();
        assert!(store.get(Flag::Refreshing));
        assert!(!store.get(Flag::ReloadOverlay));

        store.clear(Flag::Refreshing).unwrap();
        assert!(!store.get(Flag::Refreshing));
    }

    #[test]
    fn test_clones_share_state() {
        let store = FlagStore::in_memory();
        let other = store.clone();
        store.set(Flag::ReloadOverlay, true).unwrap();
        assert!(other.get(Flag::ReloadOverlay));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FlagStore::open(dir.path());
        store.set(Flag::Refreshing, true).unwrap();
        drop(store);

        let reopened = FlagStore::open(dir.path());
        assert!(reopened.get(Flag::Refreshing));

        reopened.clear(Flag::Refreshing).unwrap();
        assert!(!FlagStore::open(dir.path()).get(Flag::Refreshing));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FLAGS_FILE), "{not json").unwrap();

        let store = FlagStore::open(dir.path());
        assert!(!store.get(Flag::Refreshing));
        store.set(Flag::ReloadOverlay, true).unwrap();
        assert!(FlagStore::open(dir.path()).get(Flag::ReloadOverlay));
    }
}
