// ── Read-through TTL cache ──
//
// A concurrent key → payload map with per-entry timestamps. Reads never
// touch disk. Writes are coalesced into one snapshot save after a quiet
// period; invalidations are saved immediately. A broken snapshot never
// fails a cache operation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::snapshot::SnapshotStore;
use crate::config::{DEFAULT_CACHE_TTL, DEFAULT_PERSIST_DEBOUNCE};

/// One cached payload and the moment it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Tuning knobs for [`TtlCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub debounce: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            debounce: DEFAULT_PERSIST_DEBOUNCE,
        }
    }
}

/// Key, age, and freshness of one entry, for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Time-bounded payload cache with optional durable snapshot.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Debug, Clone)]
pub struct TtlCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    entries: DashMap<String, CacheEntry>,
    ttl: TimeDelta,
    debounce: Duration,
    clock: Arc<dyn Clock>,
    snapshot: Option<Arc<dyn SnapshotStore>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    dirty: AtomicBool,
    degraded: AtomicBool,
}

impl TtlCache {
    /// Build a cache, restoring whatever the snapshot holds.
    ///
    /// An unreadable or corrupt snapshot is logged and ignored; the
    /// cache starts empty in that case.
    pub fn open(
        options: CacheOptions,
        snapshot: Option<Arc<dyn SnapshotStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let entries = DashMap::new();
        if let Some(ref store) = snapshot {
            for (key, entry) in restore(store.as_ref()) {
                entries.insert(key, entry);
            }
        }

        Self {
            inner: Arc::new(CacheInner {
                entries,
                ttl: TimeDelta::from_std(options.ttl).unwrap_or(TimeDelta::MAX),
                debounce: options.debounce,
                clock,
                snapshot,
                pending: Mutex::new(None),
                dirty: AtomicBool::new(false),
                degraded: AtomicBool::new(false),
            }),
        }
    }

    /// Memory-only cache on the system clock.
    pub fn in_memory(ttl: Duration) -> Self {
        Self::open(
            CacheOptions {
                ttl,
                ..CacheOptions::default()
            },
            None,
            Arc::new(SystemClock),
        )
    }

    /// Return the payload for `key` if it was stored less than one TTL ago.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.inner.clock.now();
        // Expired entries stay in place until overwritten; they are only
        // excluded from reads.
        let hit = self.inner.entries.get(key).and_then(|entry| {
            self.inner
                .is_fresh(&entry, now)
                .then(|| entry.data.clone())
        });
        debug!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Store `data` under `key`, stamped with the current time.
    pub fn set(&self, key: impl Into<String>, data: Value) {
        let entry = CacheEntry {
            data,
            timestamp: self.inner.clock.now(),
        };
        self.inner.entries.insert(key.into(), entry);
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.schedule_persist();
    }

    /// Remove one key and save the snapshot right away.
    pub fn invalidate(&self, key: &str) {
        self.invalidate_keys(&[key]);
    }

    /// Remove several keys with a single snapshot save.
    pub fn invalidate_keys(&self, keys: &[&str]) {
        let mut removed = false;
        for key in keys {
            removed |= self.inner.entries.remove(*key).is_some();
        }
        debug!(?keys, removed, "cache invalidated");
        if removed {
            self.inner.cancel_pending();
            self.inner.persist();
        }
    }

    /// Drop every entry and clear the snapshot.
    pub fn invalidate_all(&self) {
        self.inner.cancel_pending();
        self.inner.entries.clear();
        self.inner.dirty.store(false, Ordering::SeqCst);
        if let Some(ref store) = self.inner.snapshot {
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to clear cache snapshot");
            }
        }
        info!("cache cleared");
    }

    /// Persist any pending write now instead of waiting for the debounce.
    pub fn flush(&self) {
        self.inner.cancel_pending();
        if self.inner.dirty.load(Ordering::SeqCst) {
            self.inner.persist();
        }
    }

    /// Entries currently held, sorted by key.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let now = self.inner.clock.now();
        let mut out: Vec<EntryInfo> = self
            .inner
            .entries
            .iter()
            .map(|entry| EntryInfo {
                key: entry.key().clone(),
                stored_at: entry.timestamp,
                fresh: self.inner.is_fresh(entry.value(), now),
            })
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// `true` once a snapshot save has failed and not yet recovered.
    pub fn is_degraded(&self) -> bool {
        self.inner.degraded.load(Ordering::SeqCst)
    }

    fn schedule_persist(&self) {
        if self.inner.snapshot.is_none() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime to debounce on: write through.
            self.inner.persist();
            return;
        };

        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let debounce = self.inner.debounce;
        let task = handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(inner) = weak.upgrade() {
                inner.persist();
            }
        });

        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }
}

impl CacheInner {
    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.timestamp) < self.ttl
    }

    fn cancel_pending(&self) {
        let task = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    fn persist(&self) {
        let Some(ref store) = self.snapshot else {
            return;
        };
        self.dirty.store(false, Ordering::SeqCst);

        let map: BTreeMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let result = serde_json::to_vec(&map)
            .map_err(|e| e.to_string())
            .and_then(|bytes| store.save(&bytes).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    info!("cache snapshot writes recovered");
                }
                debug!(entries = map.len(), "cache snapshot saved");
            }
            Err(error) => {
                if self.degraded.swap(true, Ordering::SeqCst) {
                    debug!(%error, "cache snapshot still failing");
                } else {
                    warn!(%error, "cache snapshot save failed; continuing in memory");
                }
            }
        }
    }
}

fn restore(store: &dyn SnapshotStore) -> BTreeMap<String, CacheEntry> {
    let bytes = match store.load() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return BTreeMap::new(),
        Err(e) => {
            warn!(error = %e, "cache snapshot unreadable; starting empty");
            return BTreeMap::new();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "cache snapshot corrupt; starting empty");
            BTreeMap::new()
        }
    }
}
