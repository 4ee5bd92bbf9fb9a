// ── Durable snapshot backends ──
//
// The cache persists its whole map as one JSON document. Backends only
// move bytes; they know nothing about entries or expiry.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot of {size} bytes exceeds quota of {quota} bytes")]
    QuotaExceeded { size: usize, quota: usize },

    #[error("snapshot IO error: {0}")]
    Io(#[from] io::Error),
}

/// Key-value persistence for the cache snapshot.
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Read the last saved snapshot. `Ok(None)` when nothing was saved.
    fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError>;

    /// Replace the saved snapshot.
    fn save(&self, bytes: &[u8]) -> Result<(), SnapshotError>;

    /// Remove the saved snapshot.
    fn clear(&self) -> Result<(), SnapshotError>;
}

fn check_quota(size: usize, quota: Option<usize>) -> Result<(), SnapshotError> {
    match quota {
        Some(quota) if size > quota => Err(SnapshotError::QuotaExceeded { size, quota }),
        _ => Ok(()),
    }
}

// ── File backend ─────────────────────────────────────────────────────

/// JSON file on disk, written atomically via a temp file and rename.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
    quota: Option<usize>,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota: None,
        }
    }

    #[must_use]
    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl SnapshotStore for FileSnapshot {
    fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        check_quota(bytes.len(), self.quota)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SnapshotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Memory backend ───────────────────────────────────────────────────

/// In-process snapshot, for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    data: Mutex<Option<Vec<u8>>>,
    quota: Mutex<Option<usize>>,
    writes: AtomicUsize,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with pre-existing snapshot bytes.
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(bytes.into())),
            ..Self::default()
        }
    }

    /// Change the quota; `None` removes it.
    pub fn set_quota(&self, quota: Option<usize>) {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner) = quota;
    }

    /// Number of successful `save` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current snapshot contents.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for MemorySnapshot {
    fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError> {
        Ok(self.bytes())
    }

    fn save(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let quota = *self.quota.lock().unwrap_or_else(PoisonError::into_inner);
        check_quota(bytes.len(), quota)?;
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), SnapshotError> {
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_snapshot_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshot::new(dir.path().join("nested/cache.json"));

        assert!(store.load().unwrap().is_none());
        store.save(br#"{"a":1}"#).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), br#"{"a":1}"#.to_vec());
        assert!(!store.tmp_path().exists());

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn file_snapshot_enforces_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshot::new(dir.path().join("cache.json")).with_quota(Some(4));

        let err = store.save(b"0123456789").unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::QuotaExceeded { size: 10, quota: 4 }
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_snapshot_counts_writes() {
        let store = MemorySnapshot::new();
        store.save(b"one").unwrap();
        store.save(b"two").unwrap();
        assert_eq!(store.writes(), 2);
        assert_eq!(store.bytes().unwrap(), b"two".to_vec());

        store.set_quota(Some(1));
        assert!(store.save(b"three").is_err());
        assert_eq!(store.writes(), 2);
    }
}
