// ── In-flight request coalescing ──
//
// At most one fetch per key runs at a time. The first caller spawns the
// work as its own task; later callers join the same shared future. The
// task removes its map entry when it finishes, so a completed fetch is
// never reused and the map cannot grow without bound.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, CoreError>>>;

#[derive(Clone, Default)]
pub struct FetchDeduplicator {
    inflight: Arc<Mutex<HashMap<String, SharedFetch>>>,
}

impl fmt::Debug for FetchDeduplicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDeduplicator")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn lock(
    map: &Mutex<HashMap<String, SharedFetch>>,
) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FetchDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key`, or join the run already in progress.
    ///
    /// `make` is only called when no fetch for `key` is in flight. Every
    /// caller receives a clone of the same result. Dropping one caller's
    /// future does not cancel the shared work.
    pub async fn fetch<F, Fut>(&self, key: &str, make: F) -> Result<Value, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, CoreError>> + Send + 'static,
    {
        let shared = {
            let mut map = lock(&self.inflight);
            if let Some(existing) = map.get(key) {
                debug!(key, "joining in-flight fetch");
                existing.clone()
            } else {
                debug!(key, "starting fetch");
                let work = make();
                let inflight = Arc::clone(&self.inflight);
                let owned_key = key.to_owned();
                // The entry is inserted below while the lock is still held,
                // so the task's removal always finds it.
                let task = tokio::spawn(async move {
                    let result = work.await;
                    lock(&inflight).remove(&owned_key);
                    result
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(CoreError::Internal(format!("fetch task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                map.insert(key.to_owned(), shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Number of keys with a fetch currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.inflight).len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.inflight).contains_key(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let dedup = FetchDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let spawn_caller = || {
            let dedup = dedup.clone();
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                dedup
                    .fetch("assets", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(json!({"categories": {}}))
                    })
                    .await
            })
        };

        let a = spawn_caller();
        let b = spawn_caller();
        let c = spawn_caller();
        while dedup.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        // Give the joiners a chance to attach before releasing the fetch.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for handle in [a, b, c] {
            assert_eq!(handle.await.unwrap().unwrap(), json!({"categories": {}}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_is_shared_and_entry_cleared() {
        let dedup = FetchDeduplicator::new();
        let result = dedup
            .fetch("counts", || async { Err(CoreError::Timeout) })
            .await;
        assert_eq!(result.unwrap_err(), CoreError::Timeout);
        assert!(!dedup.is_in_flight("counts"));

        let retried = dedup.fetch("counts", || async { Ok(json!(1)) }).await;
        assert_eq!(retried.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn joined_callers_receive_the_same_error() {
        let dedup = FetchDeduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let spawn_caller = || {
            let dedup = dedup.clone();
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                dedup
                    .fetch("counts", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Err(CoreError::ConnectionFailed {
                            url: "http://localhost:5000/".into(),
                            reason: "refused".into(),
                        })
                    })
                    .await
            })
        };

        let callers = [spawn_caller(), spawn_caller(), spawn_caller()];
        while !dedup.is_in_flight("counts") {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let mut errors = Vec::new();
        for handle in callers {
            errors.push(handle.await.unwrap().unwrap_err());
        }
        assert!(errors.iter().all(|e| *e == errors[0]), "{errors:?}");
        assert!(matches!(errors[0], CoreError::ConnectionFailed { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_cancel_fetch() {
        let dedup = FetchDeduplicator::new();
        let gate = Arc::new(Notify::new());
        let released = Arc::clone(&gate);

        let first = {
            let dedup = dedup.clone();
            tokio::spawn(async move {
                dedup
                    .fetch("cards", move || async move {
                        released.notified().await;
                        Ok(json!(["a"]))
                    })
                    .await
            })
        };
        while !dedup.is_in_flight("cards") {
            tokio::task::yield_now().await;
        }
        first.abort();

        let joined = {
            let dedup = dedup.clone();
            tokio::spawn(async move { dedup.fetch("cards", || async { Ok(json!([])) }).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        assert_eq!(joined.await.unwrap().unwrap(), json!(["a"]));
    }
}
