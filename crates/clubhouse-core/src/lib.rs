//! Clubhouse core: data fetching and query caching for the club website.
//!
//! - `query`: the query cache (keys, store, coordinator, UI observer)
//! - `api`: HTTP client for the club API and its error types
//! - `models`: events, news, calendar, home page and member payloads
//! - `auth`: persisted session and sign-in
//! - `config`: user configuration
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use clubhouse_core::{create_cache, ApiClient, Config, ListParams, QueryParams};
//!
//! let config = Config::load()?;
//! let cache = create_cache(ApiClient::from_config(&config)?, config.query_policy());
//!
//! let page1 = QueryParams::Events(ListParams::new(config.default_page_size));
//! let state = cache.fetch(&page1).await;
//! if let Some(page) = state.data().and_then(|d| d.as_events()) {
//!     println!("{} of {} pages", page.items.len(), page.total_pages());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod query;

pub use api::{ApiClient, ApiError, ErrorInfo, ErrorKind};
pub use auth::{AuthError, AuthService, SessionStore};
pub use config::Config;
pub use models::{DetailItem, ResourceData};
pub use query::{
    create_cache, Collection, ListParams, QueryClient, QueryKey, QueryObserver, QueryParams, QueryPolicy,
    QueryState,
};
