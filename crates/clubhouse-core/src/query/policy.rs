use std::time::Duration;

use chrono::Utc;

use super::store::{CacheEntry, QueryStatus};

/// Initial backoff between automatic retries.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;

/// Automatic retry of failed fetches. Off by default: a failed key is
/// retried when it is requested again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// When cached data counts as stale and how fetches are bounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryPolicy {
    /// `None` keeps successful data fresh for the whole session.
    pub stale_time: Option<Duration>,
    pub retry: RetryPolicy,
    /// Fetches exceeding this fail with a timeout error.
    pub fetch_timeout: Option<Duration>,
}

impl QueryPolicy {
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Successful data older than `stale_time`.
    pub fn is_stale<T>(&self, entry: &CacheEntry<T>) -> bool {
        if entry.status != QueryStatus::Success {
            return false;
        }
        match (self.stale_time, entry.last_fetched_at) {
            (Some(limit), Some(at)) => match (Utc::now() - at).to_std() {
                Ok(age) => age > limit,
                // fetched "in the future": clock skew, treat as fresh
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Whether a request for this entry should hit the network.
    pub fn needs_fetch<T>(&self, entry: &CacheEntry<T>) -> bool {
        if entry.is_fetching() {
            return false;
        }
        match entry.status {
            QueryStatus::Idle | QueryStatus::Error => true,
            QueryStatus::Success => self.is_stale(entry),
            QueryStatus::Loading => false,
        }
    }
}
