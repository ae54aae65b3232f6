//! REST API client module for the club's mock API.
//!
//! This module provides the `ApiClient`, which implements the query cache's
//! `Fetcher` for events, news, the calendar, the home aggregate and detail
//! lookups, plus the user endpoints the auth layer needs.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ErrorInfo, ErrorKind};
