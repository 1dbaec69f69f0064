//! Bounded, request-coalescing memoization for upstream lookups.
//!
//! Concurrent callers for the same key must share a single upstream fetch:
//! each key maps to a `OnceCell`, so the first caller runs the fetch while
//! later callers await the in-flight result. A failed fetch leaves the cell
//! empty, so the next caller retries from scratch; negative results are
//! never cached. Distinct keys proceed without coordination beyond the
//! short-lived map lock.

use crate::error::Result;
use lru::LruCache;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// An LRU-bounded async cache that coalesces concurrent fetches per key.
///
/// Values are cloned out on every hit; callers typically store `Arc<T>`.
pub struct CoalescedCache<K, V> {
    inner: Mutex<LruCache<K, Arc<OnceCell<V>>>>,
}

impl<K, V> std::fmt::Debug for CoalescedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescedCache").finish_non_exhaustive()
    }
}

impl<K: Hash + Eq, V: Clone> CoalescedCache<K, V> {
    /// Create a cache evicting the least-recently-used entry beyond
    /// `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be non-zero"),
            )),
        }
    }

    /// Return the cached value for `key`, or run `fetch` to produce it.
    ///
    /// At most one `fetch` is in flight per key at any time; concurrent
    /// callers await that fetch instead of issuing their own.
    ///
    /// # Errors
    ///
    /// Propagates the error of the caller's own (or awaited) failed fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = {
            let mut guard = self.inner.lock().await;
            if let Some(cell) = guard.get(&key) {
                Arc::clone(cell)
            } else {
                let cell = Arc::new(OnceCell::new());
                guard.put(key, Arc::clone(&cell));
                cell
            }
        };
        // The map lock is released before awaiting the fetch, so slow keys
        // do not block unrelated lookups.
        let value = cell.get_or_try_init(fetch).await?;
        Ok(value.clone())
    }

    /// Insert or replace the value for `key` with an already-computed one.
    ///
    /// Callers holding the previous cell keep awaiting its fetch; only
    /// lookups after this call observe the new value.
    pub async fn put(&self, key: K, value: V) {
        self.inner
            .lock()
            .await
            .put(key, Arc::new(OnceCell::new_with(Some(value))));
    }

    /// Number of entries currently cached (including in-flight cells).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
