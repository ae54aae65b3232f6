//! A UI slot bound to one query at a time.
//!
//! When the slot moves to a new key (next page, new sort, new filter) the
//! last successful data it showed stays visible until the new key resolves,
//! so lists do not flash empty during transitions.

use std::sync::Arc;

use crate::api::ErrorInfo;

use super::client::{QueryClient, QueryState};
use super::fetcher::Fetcher;
use super::key::{QueryKey, QueryParams};
use super::store::QueryStatus;

/// What a view renders for its slot.
#[derive(Debug)]
pub struct QueryResult<T> {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<ErrorInfo>,
    /// No data for the current key and a request is outstanding.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    /// `data` belongs to a previous key of this slot.
    pub is_placeholder_data: bool,
}

impl<T> QueryResult<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_deref()
    }
}

pub struct QueryObserver<F: Fetcher> {
    client: QueryClient<F>,
    params: QueryParams,
    last_data: Option<Arc<F::Data>>,
}

impl<F: Fetcher> QueryObserver<F> {
    /// Bind a slot to `params` and request it.
    pub fn new(client: QueryClient<F>, params: QueryParams) -> Self {
        client.query(&params);
        Self {
            client,
            params,
            last_data: None,
        }
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Move the slot to `params`. A no-op when the key does not change.
    pub fn set_params(&mut self, params: QueryParams) {
        if params.key() == self.params.key() {
            self.params = params;
            return;
        }
        if let Some(state) = self.client.peek(&self.params) {
            self.remember(&state);
        }
        self.params = params;
        self.client.query(&self.params);
    }

    /// Current result for the slot. Does not re-trigger failed requests;
    /// only a missing (invalidated) entry is requested again.
    pub fn result(&mut self) -> QueryResult<F::Data> {
        let state = match self.client.peek(&self.params) {
            Some(state) => state,
            None => self.client.query(&self.params),
        };
        self.remember(&state);
        self.project(state)
    }

    /// Wait for the current key to resolve.
    pub async fn wait(&mut self) -> QueryResult<F::Data> {
        let state = self.client.fetch(&self.params).await;
        self.remember(&state);
        self.project(state)
    }

    /// Forced refresh of the current key.
    pub fn refetch(&mut self) -> QueryResult<F::Data> {
        let state = self.client.refetch(&self.params);
        self.project(state)
    }

    fn remember(&mut self, state: &QueryState<F::Data>) {
        if state.is_success() {
            self.last_data = state.data.clone();
        }
    }

    fn project(&self, state: QueryState<F::Data>) -> QueryResult<F::Data> {
        let placeholder = state.data.is_none() && state.is_fetching;
        let data = if placeholder {
            self.last_data.clone()
        } else {
            state.data.clone()
        };
        QueryResult {
            is_loading: state.is_loading(),
            is_fetching: state.is_fetching,
            is_error: state.is_error(),
            is_placeholder_data: placeholder && data.is_some(),
            key: state.key,
            status: state.status,
            error: state.error,
            data,
        }
    }
}
