//! Query coordinator: mediates between views and the remote API.
//!
//! Callers ask for a [`QueryParams`]; the client answers from the cache and
//! starts a fetch only when the entry is idle, failed, or stale. Concurrent
//! requests for one key share a single fetch, and a result is applied only if
//! its generation is still the entry's in-flight generation, so a slow,
//! superseded response can never overwrite a newer one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiError, ErrorInfo};

use super::fetcher::Fetcher;
use super::key::{build_key, QueryKey, QueryParams};
use super::policy::QueryPolicy;
use super::store::{CacheEntry, CacheStore, QueryStatus};

/// Snapshot of one key's entry as seen by a caller.
#[derive(Debug)]
pub struct QueryState<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ErrorInfo>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub is_fetching: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            is_fetching: self.is_fetching,
        }
    }
}

impl<T> QueryState<T> {
    fn from_entry(key: QueryKey, entry: CacheEntry<T>) -> Self {
        Self {
            key,
            status: entry.status,
            is_fetching: entry.is_fetching(),
            data: entry.data,
            error: entry.error,
            last_fetched_at: entry.last_fetched_at,
        }
    }

    /// First fetch of this key: nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && (self.is_fetching || self.status == QueryStatus::Idle)
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

struct Inner<F: Fetcher> {
    store: CacheStore<F::Data>,
    fetcher: F,
    policy: QueryPolicy,
}

/// The public face of the cache. Cheap to clone; clones share one store.
///
/// Methods that may start a fetch spawn it onto the current Tokio runtime.
pub struct QueryClient<F: Fetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for QueryClient<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Create an isolated store with a coordinator bound to it.
pub fn create_cache<F: Fetcher>(fetcher: F, policy: QueryPolicy) -> QueryClient<F> {
    QueryClient::new(fetcher, policy)
}

impl<F: Fetcher> QueryClient<F> {
    pub fn new(fetcher: F, policy: QueryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: CacheStore::new(),
                fetcher,
                policy,
            }),
        }
    }

    pub fn store(&self) -> &CacheStore<F::Data> {
        &self.inner.store
    }

    pub fn policy(&self) -> &QueryPolicy {
        &self.inner.policy
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Current state for `params`, starting a fetch if the entry needs one.
    /// Never waits for the network.
    pub fn query(&self, params: &QueryParams) -> QueryState<F::Data> {
        self.ensure(build_key(params), params, false)
    }

    /// Warm the cache for `params` (e.g. the next page) without observing it.
    pub fn prefetch(&self, params: &QueryParams) {
        self.ensure(build_key(params), params, false);
    }

    /// Like [`query`](Self::query), then wait until no request for the key is
    /// in flight. Joins an existing request instead of issuing a second one.
    pub async fn fetch(&self, params: &QueryParams) -> QueryState<F::Data> {
        let key = build_key(params);
        let rx = self.inner.store.subscribe(&key);
        self.ensure(key.clone(), params, false);
        self.settle(key, rx).await
    }

    /// Forced refresh. Always issues a new request, superseding any in-flight
    /// one; previous data stays visible until the new result arrives.
    pub fn refetch(&self, params: &QueryParams) -> QueryState<F::Data> {
        self.ensure(build_key(params), params, true)
    }

    /// Wait for the current request for `params`, if any, without starting one.
    pub async fn settled(&self, params: &QueryParams) -> QueryState<F::Data> {
        let key = build_key(params);
        let rx = self.inner.store.subscribe(&key);
        self.settle(key, rx).await
    }

    /// Current state without triggering a fetch.
    pub fn peek(&self, params: &QueryParams) -> Option<QueryState<F::Data>> {
        let key = build_key(params);
        self.inner
            .store
            .get(&key)
            .map(|entry| QueryState::from_entry(key, entry))
    }

    /// Observe the entry for `params`. Does not trigger a fetch.
    pub fn subscribe(&self, params: &QueryParams) -> watch::Receiver<CacheEntry<F::Data>> {
        self.inner.store.subscribe(&build_key(params))
    }

    /// Drop the cached entry so the next request refetches.
    pub fn invalidate(&self, params: &QueryParams) -> bool {
        self.invalidate_key(&build_key(params))
    }

    pub fn invalidate_key(&self, key: &QueryKey) -> bool {
        let removed = self.inner.store.delete(key);
        if removed {
            debug!(key = %key, "Invalidated cache entry");
        }
        removed
    }

    /// Drop every entry whose key matches `pred`.
    pub fn invalidate_where(&self, pred: impl FnMut(&QueryKey) -> bool) -> usize {
        let removed = self.inner.store.delete_where(pred);
        debug!(removed, "Invalidated matching cache entries");
        removed
    }

    fn ensure(&self, key: QueryKey, params: &QueryParams, force: bool) -> QueryState<F::Data> {
        let inner = &self.inner;
        let mut issued = None;
        let entry = inner.store.modify(&key, |entry| {
            if force || inner.policy.needs_fetch(entry) {
                let generation = inner.store.next_generation();
                entry.begin(generation);
                issued = Some(generation);
                true
            } else {
                false
            }
        });

        match issued {
            Some(generation) => {
                debug!(key = %key, generation, force, "Starting fetch");
                let task = Arc::clone(inner);
                let params = params.clone();
                let fetch_key = key.clone();
                tokio::spawn(async move {
                    task.run(fetch_key, params, generation).await;
                });
            }
            None if entry.is_fetching() => debug!(key = %key, "Joining in-flight request"),
            None => debug!(key = %key, "Cache hit"),
        }

        QueryState::from_entry(key, entry)
    }

    async fn settle(
        &self,
        key: QueryKey,
        mut rx: watch::Receiver<CacheEntry<F::Data>>,
    ) -> QueryState<F::Data> {
        let settled = match rx.wait_for(|entry| !entry.is_fetching()).await {
            Ok(entry) => Some(entry.clone()),
            // entry was deleted while in flight
            Err(_) => None,
        };
        let entry = settled
            .or_else(|| self.inner.store.get(&key))
            .unwrap_or_default();
        QueryState::from_entry(key, entry)
    }
}

impl<F: Fetcher> Inner<F> {
    fn is_current(&self, key: &QueryKey, generation: u64) -> bool {
        self.store
            .get(key)
            .map(|entry| entry.inflight == Some(generation))
            .unwrap_or(false)
    }

    async fn fetch_once(&self, params: &QueryParams) -> Result<F::Data, ApiError> {
        match self.policy.fetch_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.fetcher.fetch(params)).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout(limit)),
            },
            None => self.fetcher.fetch(params).await,
        }
    }

    async fn run(&self, key: QueryKey, params: QueryParams, generation: u64) {
        let mut attempt = 0;
        loop {
            match self.fetch_once(&params).await {
                Ok(data) => {
                    let data = Arc::new(data);
                    if self.store.modify_existing(&key, |entry| entry.succeed(generation, data)) {
                        debug!(key = %key, generation, "Applied fetch result");
                    } else {
                        debug!(key = %key, generation, "Discarded superseded result");
                    }
                    return;
                }
                Err(err) => {
                    if attempt < self.policy.retry.max_retries && self.is_current(&key, generation) {
                        attempt += 1;
                        let delay = self.policy.retry.backoff(attempt);
                        warn!(key = %key, error = %err, retry = attempt, backoff_ms = delay.as_millis() as u64, "Fetch failed, backing off");
                        tokio::time::sleep(delay).await;
                        if !self.is_current(&key, generation) {
                            debug!(key = %key, generation, "Request superseded during backoff");
                            return;
                        }
                        continue;
                    }

                    let info = ErrorInfo::from(&err);
                    if self.store.modify_existing(&key, |entry| entry.fail(generation, info)) {
                        warn!(key = %key, generation, error = %err, "Fetch failed");
                    } else {
                        debug!(key = %key, generation, error = %err, "Discarded superseded failure");
                    }
                    return;
                }
            }
        }
    }
}
