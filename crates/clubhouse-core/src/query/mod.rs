//! Client-side query cache.
//!
//! Views ask the [`QueryClient`] for a resource; it answers from an in-memory
//! [`CacheStore`] keyed by [`QueryKey`], fetching through a [`Fetcher`] only
//! when an entry is idle, failed, or stale. Successful data is kept fresh for
//! the session unless a stale time is configured.
//!
//! - `key`: parameters and canonical keys
//! - `store`: entries and their lifecycle
//! - `client`: the coordinator (dedup, last-request-wins, keep-previous-data)
//! - `observer`: a UI slot that keeps showing the previous page while the next loads

pub mod client;
pub mod fetcher;
pub mod key;
pub mod observer;
pub mod page;
pub mod policy;
pub mod store;

pub use client::{create_cache, QueryClient, QueryState};
pub use fetcher::Fetcher;
pub use key::{
    build_key, Collection, FilterValue, ListParams, QueryKey, QueryParams, ResourceKind, SortField,
    SortOrder, SortSpec, FILTER_CATEGORY, FILTER_STATUS,
};
pub use observer::{QueryObserver, QueryResult};
pub use page::Page;
pub use policy::{QueryPolicy, RetryPolicy};
pub use store::{CacheEntry, CacheStore, QueryStatus};
