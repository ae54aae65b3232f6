//! In-memory store of cache entries, one per query key.
//!
//! Every entry lives behind a `watch` channel so observers are re-notified
//! whenever the coordinator transitions it. The map itself is guarded by a
//! mutex that is only held for synchronous read-modify-write steps.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::api::ErrorInfo;

use super::key::QueryKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Idle => write!(f, "idle"),
            QueryStatus::Loading => write!(f, "loading"),
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::Error => write!(f, "error"),
        }
    }
}

/// Stored state for one query key.
///
/// `status == Success` implies `data.is_some() && error.is_none()`;
/// `status == Error` implies `error.is_some()`. `inflight` holds the
/// generation of the one request whose result may still be applied.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ErrorInfo>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub inflight: Option<u64>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            inflight: self.inflight,
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> CacheEntry<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            inflight: None,
        }
    }

    /// An entry that already holds a successful result.
    pub fn with_data(data: T) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(Arc::new(data)),
            error: None,
            last_fetched_at: Some(Utc::now()),
            inflight: None,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.inflight.is_some()
    }

    /// Mark a request of `generation` as the current one. Previous data is kept.
    pub(crate) fn begin(&mut self, generation: u64) {
        self.status = QueryStatus::Loading;
        self.inflight = Some(generation);
    }

    /// Apply a successful result if `generation` is still current.
    pub(crate) fn succeed(&mut self, generation: u64, data: Arc<T>) -> bool {
        if self.inflight != Some(generation) {
            return false;
        }
        self.status = QueryStatus::Success;
        self.data = Some(data);
        self.error = None;
        self.last_fetched_at = Some(Utc::now());
        self.inflight = None;
        true
    }

    /// Apply a failure if `generation` is still current. Previous data is kept.
    pub(crate) fn fail(&mut self, generation: u64, error: ErrorInfo) -> bool {
        if self.inflight != Some(generation) {
            return false;
        }
        self.status = QueryStatus::Error;
        self.error = Some(error);
        self.inflight = None;
        true
    }
}

/// Process-wide mapping from [`QueryKey`] to [`CacheEntry`].
pub struct CacheStore<T> {
    entries: Mutex<HashMap<QueryKey, watch::Sender<CacheEntry<T>>>>,
    generation: AtomicU64,
}

impl<T> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheStore<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, watch::Sender<CacheEntry<T>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh request generation. Monotonic across the whole store, so a token
    /// issued before a `delete` can never match an entry created after it.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry<T>> {
        self.lock().get(key).map(|tx| tx.borrow().clone())
    }

    /// Overwrite the entry for `key`, notifying observers.
    pub fn put(&self, key: QueryKey, entry: CacheEntry<T>) {
        let mut entries = self.lock();
        match entries.get(&key) {
            Some(tx) => {
                tx.send_replace(entry);
            }
            None => {
                entries.insert(key, watch::channel(entry).0);
            }
        }
    }

    /// Remove the entry. Observers see their channel close.
    pub fn delete(&self, key: &QueryKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry whose key matches. Returns how many were removed.
    ///
    /// `pred` runs without the map lock held, so it may read the store.
    pub fn delete_where(&self, mut pred: impl FnMut(&QueryKey) -> bool) -> usize {
        let matching: Vec<QueryKey> = self.keys().into_iter().filter(|key| pred(key)).collect();
        let mut entries = self.lock();
        matching
            .iter()
            .filter(|key| entries.remove(*key).is_some())
            .count()
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Observe the entry for `key`, creating an idle one if missing.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<CacheEntry<T>> {
        self.lock()
            .entry(key.clone())
            .or_insert_with(|| watch::channel(CacheEntry::idle()).0)
            .subscribe()
    }

    /// Atomic read-modify-write on the entry for `key`, creating an idle one
    /// if missing. Observers are notified only when `f` returns true.
    /// Returns the entry as it stands afterwards.
    pub(crate) fn modify(
        &self,
        key: &QueryKey,
        f: impl FnOnce(&mut CacheEntry<T>) -> bool,
    ) -> CacheEntry<T> {
        let mut entries = self.lock();
        let tx = entries
            .entry(key.clone())
            .or_insert_with(|| watch::channel(CacheEntry::idle()).0);
        tx.send_if_modified(f);
        let snapshot = tx.borrow().clone();
        snapshot
    }

    /// Like [`modify`](Self::modify) but never resurrects a deleted entry.
    /// Returns whether `f` reported a change.
    pub(crate) fn modify_existing(
        &self,
        key: &QueryKey,
        f: impl FnOnce(&mut CacheEntry<T>) -> bool,
    ) -> bool {
        match self.lock().get(key) {
            Some(tx) => tx.send_if_modified(f),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ErrorInfo};
    use crate::query::key::{build_key, Collection, ListParams, QueryParams};

    fn key(page: u32) -> QueryKey {
        build_key(&QueryParams::Events(ListParams::new(6).with_page(page)))
    }

    #[test]
    fn test_get_put_delete() {
        let store: CacheStore<Vec<u32>> = CacheStore::new();
        assert!(store.get(&key(1)).is_none());

        store.put(key(1), CacheEntry::with_data(vec![1, 2]));
        let entry = store.get(&key(1)).expect("entry present");
        assert_eq!(entry.status, QueryStatus::Success);
        assert_eq!(entry.data.as_deref(), Some(&vec![1, 2]));

        store.put(key(1), CacheEntry::idle());
        assert_eq!(store.get(&key(1)).map(|e| e.status), Some(QueryStatus::Idle));

        assert!(store.delete(&key(1)));
        assert!(!store.delete(&key(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_where() {
        let store: CacheStore<u32> = CacheStore::new();
        store.put(key(1), CacheEntry::with_data(1));
        store.put(key(2), CacheEntry::with_data(2));
        store.put(build_key(&QueryParams::detail(Collection::Users, "3")), CacheEntry::with_data(3));

        let removed = store.delete_where(|k| k.page().is_some());
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_where_predicate_can_read_store() {
        let store: CacheStore<u32> = CacheStore::new();
        store.put(key(1), CacheEntry::with_data(1));
        store.put(key(2), CacheEntry::with_data(2));

        let removed = store.delete_where(|k| {
            store.len() == 2 && store.get(k).and_then(|e| e.data).is_some_and(|d| *d == 2)
        });
        assert_eq!(removed, 1);
        assert!(store.get(&key(1)).is_some());
        assert!(store.get(&key(2)).is_none());
    }

    #[test]
    fn test_stale_generation_is_rejected() {
        let mut entry: CacheEntry<u32> = CacheEntry::idle();
        entry.begin(1);
        entry.begin(2);
        assert!(!entry.succeed(1, Arc::new(10)));
        assert_eq!(entry.status, QueryStatus::Loading);
        assert!(entry.succeed(2, Arc::new(20)));
        assert_eq!(entry.data.as_deref(), Some(&20));
        assert!(entry.inflight.is_none());
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut entry = CacheEntry::with_data(5u32);
        entry.begin(7);
        assert_eq!(entry.data.as_deref(), Some(&5));
        assert!(entry.fail(7, ErrorInfo::from(ApiError::RateLimited)));
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.data.as_deref(), Some(&5));
        assert!(entry.error.is_some());
    }

    #[test]
    fn test_generations_are_monotonic() {
        let store: CacheStore<u32> = CacheStore::new();
        let a = store.next_generation();
        let b = store.next_generation();
        assert!(b > a);
    }

    #[test]
    fn test_modify_notifies_subscribers() {
        let store: CacheStore<u32> = CacheStore::new();
        let mut rx = store.subscribe(&key(1));
        assert!(!rx.has_changed().unwrap_or(true));

        store.modify(&key(1), |_| false);
        assert!(!rx.has_changed().unwrap_or(true));

        store.modify(&key(1), |e| {
            e.begin(1);
            true
        });
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Loading);
    }

    #[test]
    fn test_modify_existing_skips_deleted() {
        let store: CacheStore<u32> = CacheStore::new();
        assert!(!store.modify_existing(&key(1), |_| true));
        assert!(store.get(&key(1)).is_none());
    }
}
