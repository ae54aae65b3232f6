//! API client for the club's REST API.
//!
//! The API follows json-server conventions: lists take `_page`, `_limit`,
//! `_sort` and `_order` query parameters plus one parameter per filter, and
//! report the unpaged total in the `X-Total-Count` header.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    CalendarEvent, CalendarEventWire, DetailItem, Event, HomeData, NewUser, NewsItem, ProfileUpdate,
    ResourceData, User, UserRecord,
};
use crate::query::{build_key, Collection, Fetcher, FilterValue, ListParams, Page, QueryParams};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the unpaged item count of a list response.
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the club site.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Override the first rate-limit backoff delay.
    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit
    /// (should retry), or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, backing off and retrying while rate limited.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = build()
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    async fn json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send(|| self.client.get(&url)).await?;
        Self::json(response, path).await
    }

    // ===== Lists =====

    /// json-server query parameters for a list request. Only filters the
    /// resource recognises and that are actually set are sent.
    fn list_query(params: &QueryParams) -> Vec<(String, String)> {
        let key = build_key(params);
        let mut query = Vec::new();
        if let (Some(page), Some(limit), Some(sort)) = (key.page(), key.page_size(), key.sort()) {
            query.push(("_page".to_string(), page.to_string()));
            query.push(("_limit".to_string(), limit.to_string()));
            query.push(("_sort".to_string(), sort.field.as_str().to_string()));
            query.push(("_order".to_string(), sort.order.as_str().to_string()));
        }
        for name in key.kind().filter_keys() {
            if let Some(FilterValue::Is(value)) = key.filter(name) {
                query.push((name.to_string(), value.clone()));
            }
        }
        query
    }

    /// Total from `X-Total-Count`, falling back to the number of items received.
    fn total_count(headers: &header::HeaderMap, received: usize) -> u64 {
        headers
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| {
                debug!("No usable total count header, using item count");
                received as u64
            })
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        page_size: u32,
    ) -> Result<Page<T>, ApiError> {
        let url = self.url(path);
        let query = Self::list_query(params);
        let response = self.send(|| self.client.get(&url).query(&query)).await?;
        let headers = response.headers().clone();
        let items: Vec<T> = Self::json(response, path).await?;
        let total = Self::total_count(&headers, items.len());
        debug!(path, received = items.len(), total, "List page fetched");
        Ok(Page::new(items, total, page_size))
    }

    /// Fetch one page of events
    pub async fn fetch_events(&self, params: &ListParams) -> Result<Page<Event>, ApiError> {
        let query = QueryParams::Events(params.clone());
        self.fetch_page("events", &query, params.page_size.max(1)).await
    }

    /// Fetch one page of news
    pub async fn fetch_news(&self, params: &ListParams) -> Result<Page<NewsItem>, ApiError> {
        let query = QueryParams::News(params.clone());
        self.fetch_page("news", &query, params.page_size.max(1)).await
    }

    /// Fetch the full calendar, converting start/end to date-times
    pub async fn fetch_calendar_events(&self) -> Result<Vec<CalendarEvent>, ApiError> {
        let wire: Vec<CalendarEventWire> = self.get_json("calendarEvents").await?;
        wire.into_iter()
            .map(CalendarEvent::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::InvalidResponse)
    }

    /// Fetch the landing page aggregate
    pub async fn fetch_home(&self) -> Result<HomeData, ApiError> {
        self.get_json("home").await
    }

    // ===== Details =====

    /// Decode a detail body. The API answers `{}` for unknown ids.
    fn parse_detail<T: DeserializeOwned>(text: &str) -> Result<Option<T>, ApiError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse detail: {}", e)))?;
        match &value {
            Value::Null => return Ok(None),
            Value::Object(map) if map.is_empty() => return Ok(None),
            _ => {}
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse detail: {}", e)))
    }

    async fn fetch_one<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<Option<T>, ApiError> {
        let url = self.url(&format!("{}/{}", collection.path(), id));
        let response = match self.send(|| self.client.get(&url)).await {
            Ok(response) => response,
            Err(ApiError::NotFound(_)) => {
                debug!(collection = collection.path(), id, "Detail not found");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let text = response.text().await?;
        Self::parse_detail(&text)
    }

    /// Fetch a single record by id. Unknown ids are `Ok(None)`, not errors.
    pub async fn fetch_detail(&self, collection: Collection, id: &str) -> Result<Option<DetailItem>, ApiError> {
        Ok(match collection {
            Collection::Events => self.fetch_one(collection, id).await?.map(DetailItem::Event),
            Collection::News => self.fetch_one(collection, id).await?.map(DetailItem::News),
            Collection::Users => self
                .fetch_one::<UserRecord>(collection, id)
                .await?
                .map(|record| DetailItem::User(record.user)),
        })
    }

    // ===== Users =====

    pub(crate) async fn find_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>, ApiError> {
        let url = self.url("users");
        let response = self
            .send(|| self.client.get(&url).query(&[("email", email)]))
            .await?;
        Self::json(response, "users").await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let url = self.url("users");
        let response = self.send(|| self.client.post(&url).json(user)).await?;
        let record: UserRecord = Self::json(response, "created user").await?;
        Ok(record.user)
    }

    pub async fn update_user(&self, id: &str, update: &ProfileUpdate) -> Result<User, ApiError> {
        let url = self.url(&format!("users/{}", id));
        let response = self.send(|| self.client.patch(&url).json(update)).await?;
        let record: UserRecord = Self::json(response, "updated user").await?;
        Ok(record.user)
    }
}

impl Fetcher for ApiClient {
    type Data = ResourceData;

    fn fetch<'a>(&'a self, params: &'a QueryParams) -> BoxFuture<'a, Result<ResourceData, ApiError>> {
        async move {
            match params {
                QueryParams::Events(list) => self.fetch_events(list).await.map(ResourceData::Events),
                QueryParams::News(list) => self.fetch_news(list).await.map(ResourceData::News),
                QueryParams::CalendarEvents => self.fetch_calendar_events().await.map(ResourceData::Calendar),
                QueryParams::HomeAggregate => self.fetch_home().await.map(ResourceData::Home),
                QueryParams::Detail { collection, id } => {
                    self.fetch_detail(*collection, id).await.map(ResourceData::Detail)
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;
    use crate::query::{create_cache, QueryPolicy, SortField, SortOrder, FILTER_CATEGORY, FILTER_STATUS};
    use httpmock::MockServer;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.base_url(), Duration::from_secs(5))
            .expect("client")
            .with_rate_limit_backoff(Duration::from_millis(1))
    }

    fn event(id: u32) -> Value {
        json!({
            "id": id,
            "titleKey": format!("events.e{id}.title"),
            "date": "2026-06-01T10:00:00Z",
            "categoryKey": "sports",
            "statusKey": "upcoming",
            "participants": {"count": id}
        })
    }

    #[test]
    fn test_list_query_sends_only_set_filters() {
        let params = QueryParams::Events(
            ListParams::new(6)
                .with_sort(SortField::ParticipantsCount, SortOrder::Asc)
                .with_filter(FILTER_CATEGORY, "sports")
                .with_filter(FILTER_STATUS, "")
                .with_page(2),
        );
        let query = ApiClient::list_query(&params);
        let pairs: Vec<(&str, &str)> = query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("_page", "2"),
                ("_limit", "6"),
                ("_sort", "participants.count"),
                ("_order", "asc"),
                ("categoryKey", "sports"),
            ]
        );
    }

    #[test]
    fn test_total_count_header() {
        let mut headers = header::HeaderMap::new();
        assert_eq!(ApiClient::total_count(&headers, 4), 4);
        headers.insert(TOTAL_COUNT_HEADER, header::HeaderValue::from_static("13"));
        assert_eq!(ApiClient::total_count(&headers, 6), 13);
        headers.insert(TOTAL_COUNT_HEADER, header::HeaderValue::from_static("lots"));
        assert_eq!(ApiClient::total_count(&headers, 6), 6);
    }

    #[test]
    fn test_parse_detail_empty_object_is_not_found() {
        assert_eq!(ApiClient::parse_detail::<Event>("{}").expect("parses"), None);
        assert_eq!(ApiClient::parse_detail::<Event>("null").expect("parses"), None);
        let found = ApiClient::parse_detail::<Event>(&event(1).to_string()).expect("parses");
        assert_eq!(found.map(|e| e.participants.count), Some(1));
        assert!(ApiClient::parse_detail::<Event>(r#"{"id":1}"#).is_err());
    }

    #[tokio::test]
    async fn test_fetch_events_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/events")
                .query_param("_page", "1")
                .query_param("_limit", "6")
                .query_param("_sort", "date")
                .query_param("_order", "desc")
                .query_param("statusKey", "upcoming");
            then.status(200)
                .header("X-Total-Count", "13")
                .json_body(json!([event(1), event(2), event(3), event(4), event(5), event(6)]));
        });

        let page = client(&server)
            .fetch_events(&ListParams::new(6).with_filter(FILTER_STATUS, "upcoming"))
            .await
            .expect("events page");
        mock.assert();
        assert_eq!(page.items.len(), 6);
        assert_eq!(page.total_count, 13);
        assert_eq!(page.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_fetch_news_empty_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/news").query_param("categoryKey", "club");
            then.status(200).header("X-Total-Count", "0").json_body(json!([]));
        });

        let page = client(&server)
            .fetch_news(&ListParams::new(6).with_filter(FILTER_CATEGORY, "club"))
            .await
            .expect("news page");
        assert!(page.is_empty());
        assert_eq!(page.total_pages(), 0);
    }

    #[tokio::test]
    async fn test_fetch_calendar_converts_dates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/calendarEvents");
            then.status(200).json_body(json!([
                {"id": 1, "titleKey": "cal.a", "start": "2026-05-02T18:00:00Z", "end": "2026-05-02T20:00:00Z"}
            ]));
        });

        let events = client(&server).fetch_calendar_events().await.expect("calendar");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration(), chrono::Duration::hours(2));
    }

    #[tokio::test]
    async fn test_fetch_calendar_rejects_bad_dates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/calendarEvents");
            then.status(200).json_body(json!([{"id": 1, "titleKey": "cal.a", "start": "someday"}]));
        });

        let err = client(&server).fetch_calendar_events().await.expect_err("bad date");
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_detail_not_found_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/events/999");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method("GET").path("/news/404");
            then.status(404).body("{}");
        });

        let api = client(&server);
        assert_eq!(api.fetch_detail(Collection::Events, "999").await.expect("ok"), None);
        assert_eq!(api.fetch_detail(Collection::News, "404").await.expect("ok"), None);
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/events/1");
            then.status(500).body("boom");
        });

        let err = client(&server)
            .fetch_detail(Collection::Events, "1")
            .await
            .expect_err("server error");
        assert!(matches!(err, ApiError::ServerError(ref body) if body == "boom"));
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/home");
            then.status(429);
        });

        let err = client(&server).fetch_home().await.expect_err("rate limited");
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).expect("client");
        let err = api.fetch_home().await.expect_err("connection refused");
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_cache_over_http_detail_states() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/events/999");
            then.status(200).json_body(json!({}));
        });
        server.mock(|when, then| {
            when.method("GET").path("/events/1");
            then.status(503).body("down");
        });

        let cache = create_cache(client(&server), QueryPolicy::default());

        let missing = cache.fetch(&QueryParams::detail(Collection::Events, "999")).await;
        assert!(!missing.is_error());
        assert!(missing.data().is_some_and(|d| d.is_not_found()));

        let failed = cache.fetch(&QueryParams::detail(Collection::Events, "1")).await;
        assert!(failed.is_error());
        assert!(failed.data.is_none());
        assert_eq!(failed.error.map(|e| e.kind), Some(ErrorKind::Network));
    }

    #[tokio::test]
    async fn test_user_endpoints() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/users").query_param("email", "ada@example.org");
            then.status(200).json_body(json!([
                {"id": 2, "name": "Ada", "email": "ada@example.org", "password": "pw"}
            ]));
        });
        let patch = server.mock(|when, then| {
            when.method("PATCH").path("/users/2").json_body(json!({"phone": "555"}));
            then.status(200).json_body(json!(
                {"id": 2, "name": "Ada", "email": "ada@example.org", "phone": "555", "password": "pw"}
            ));
        });

        let api = client(&server);
        let found = api.find_users_by_email("ada@example.org").await.expect("users");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.name, "Ada");

        let update = ProfileUpdate {
            phone: Some("555".to_string()),
            ..Default::default()
        };
        let updated = api.update_user("2", &update).await.expect("updated");
        patch.assert();
        assert_eq!(updated.phone.as_deref(), Some("555"));
    }
}
