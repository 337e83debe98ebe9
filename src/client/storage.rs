// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable key/value storage shared by every session handle of one origin.
//!
//! A backend plays the role of the browser's local storage: all handles
//! cloned from one backend see the same keys, and every committed write is
//! announced on a broadcast channel stamped with the writer's origin so
//! other handles can react to it.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the change-notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// One key mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Set { key: String, value: String },
    Remove { key: String },
}

impl StorageOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        StorageOp::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        StorageOp::Remove { key: key.into() }
    }

    fn key(&self) -> &str {
        match self {
            StorageOp::Set { key, .. } | StorageOp::Remove { key } => key,
        }
    }
}

/// Notification that a batch was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Handle that performed the write.
    pub origin: Uuid,
    pub keys: Vec<String>,
}

type Entries = BTreeMap<String, String>;

fn apply_ops(entries: &mut Entries, ops: &[StorageOp]) {
    for op in ops {
        match op {
            StorageOp::Set { key, value } => {
                entries.insert(key.clone(), value.clone());
            }
            StorageOp::Remove { key } => {
                entries.remove(key);
            }
        }
    }
}

fn change_for(origin: Uuid, ops: &[StorageOp]) -> StorageChange {
    StorageChange {
        origin,
        keys: ops.iter().map(|op| op.key().to_string()).collect(),
    }
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Commit all `ops` as one write, then notify subscribers.
    fn apply(&self, origin: Uuid, ops: &[StorageOp]) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Process-local storage. Clones share the same entries and channel.
#[derive(Clone)]
pub struct MemoryStorage {
    entries: Arc<RwLock<Entries>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(Entries::new())),
            changes,
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn apply(&self, origin: Uuid, ops: &[StorageOp]) -> Result<(), StorageError> {
        {
            let mut entries = self.entries.write().map_err(|_| StorageError::Poisoned)?;
            apply_ops(&mut entries, ops);
        }
        // No subscribers is fine.
        let _ = self.changes.send(change_for(origin, ops));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// Every batch rewrites the whole document through a temp file and a rename,
/// so readers never observe a half-written session. A document that fails to
/// parse is treated as empty.
#[derive(Clone)]
pub struct FileStorage {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(())),
            changes,
        })
    }

    fn load(&self) -> Result<Entries, StorageError> {
        let raw = match fs::read_to_string(self.path.as_path()) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt session storage");
                Ok(Entries::new())
            }
        }
    }

    fn store(&self, entries: &Entries) -> Result<(), StorageError> {
        let temp_path = self.path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, entries)?;
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&temp_path, self.path.as_path()) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn apply(&self, origin: Uuid, ops: &[StorageOp]) -> Result<(), StorageError> {
        {
            let _guard = self.write_lock.lock().map_err(|_| StorageError::Poisoned)?;
            let mut entries = self.load()?;
            apply_ops(&mut entries, ops);
            self.store(&entries)?;
        }
        let _ = self.changes.send(change_for(origin, ops));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_storage_is_shared_between_clones() {
        let a = MemoryStorage::new();
        let b = a.clone();

        a.apply(Uuid::new_v4(), &[StorageOp::set("k", "v")]).unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));

        b.apply(Uuid::new_v4(), &[StorageOp::remove("k")]).unwrap();
        assert_eq!(a.get("k").unwrap(), None);
    }

    #[tokio::test]
    async fn apply_notifies_with_origin_and_keys() {
        let storage = MemoryStorage::new();
        let mut rx = storage.subscribe();
        let origin = Uuid::new_v4();

        storage
            .apply(origin, &[StorageOp::set("a", "1"), StorageOp::remove("b")])
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.origin, origin);
        assert_eq!(change.keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let first = FileStorage::open(&path).unwrap();
        first
            .apply(Uuid::new_v4(), &[StorageOp::set("a", "1"), StorageOp::set("b", "2")])
            .unwrap();

        let second = FileStorage::open(&path).unwrap();
        assert_eq!(second.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(second.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn file_storage_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("session.json")).unwrap();
        storage.apply(Uuid::new_v4(), &[StorageOp::set("a", "1")]).unwrap();
        storage.apply(Uuid::new_v4(), &[StorageOp::remove("a")]).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["session.json".to_string()]);
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_repaired_by_next_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.apply(Uuid::new_v4(), &[StorageOp::set("a", "1")]).unwrap();
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("nested").join("session.json")).unwrap();
        assert_eq!(storage.get("anything").unwrap(), None);
    }
}
