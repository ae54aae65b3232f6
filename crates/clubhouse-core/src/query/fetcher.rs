use std::sync::Arc;

use futures::future::BoxFuture;

use crate::api::ApiError;

use super::key::QueryParams;

/// Performs one network call for one resource and parameter combination.
///
/// Implementations translate "not found" on detail fetches into a successful
/// empty value; only transport and status failures are errors.
pub trait Fetcher: Send + Sync + 'static {
    type Data: Send + Sync + 'static;

    fn fetch<'a>(&'a self, params: &'a QueryParams) -> BoxFuture<'a, Result<Self::Data, ApiError>>;
}

impl<F: Fetcher> Fetcher for Arc<F> {
    type Data = F::Data;

    fn fetch<'a>(&'a self, params: &'a QueryParams) -> BoxFuture<'a, Result<Self::Data, ApiError>> {
        (**self).fetch(params)
    }
}
