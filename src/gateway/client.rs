//! HTTP search gateway
//!
//! Talks to the provider's two-phase search API:
//! - `advanced_search_ids` returns every matching id plus a page size
//! - `advanced_search` returns the records for one page of ids
//!
//! Records are fetched page by page while the result set is drained.
//! There is no retry here; the fetch engine decides what a failure means.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::types::{BufferedResultSet, ResultSet, SearchGateway};
use crate::error::{Error, Result};
use crate::model::{decode_record, Entity, EntityKind};
use crate::streams::StreamDef;
use crate::types::JsonValue;
use crate::window::Window;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Ids per page when the provider does not say
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Connection settings for [`HttpGateway`]
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL, e.g. `https://api.braintreegateway.com`
    pub base_url: String,
    /// Merchant account id
    pub merchant_id: String,
    /// Public API key (basic auth user)
    pub public_key: String,
    /// Private API key (basic auth password)
    pub private_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl GatewayConfig {
    /// Create a config with default timeout and rate limit
    pub fn new(
        base_url: impl Into<String>,
        merchant_id: impl Into<String>,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            merchant_id: merchant_id.into(),
            public_key: public_key.into(),
            private_key: private_key.into(),
            timeout: Duration::from_secs(60),
            rate_limit: Some(RateLimiterConfig::default()),
            user_agent: format!("solidafy-braintree/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the rate limit
    #[must_use]
    pub fn with_rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    #[must_use]
    pub fn without_rate_limit(mut self) -> Self {
        self.rate_limit = None;
        self
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("merchant_id", &self.merchant_id)
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .field("timeout", &self.timeout)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SearchIdsResponse {
    search_results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    ids: Vec<String>,
}

/// [`SearchGateway`] over HTTP with basic auth and rate limiting
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    config: Arc<GatewayConfig>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpGateway {
    /// Create a gateway
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config: Arc::new(config),
            rate_limiter,
        })
    }

    /// Gateway configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn resource_url(&self, resource: &str, action: Option<&str>) -> Result<Url> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = format!("{base}/merchants/{}/{resource}", self.config.merchant_id);
        if let Some(action) = action {
            url.push('/');
            url.push_str(action);
        }
        Ok(Url::parse(&url)?)
    }

    /// Send a request and parse the JSON body, classifying failures
    async fn execute(&self, request: RequestBuilder) -> Result<JsonValue> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let response = request
            .basic_auth(&self.config.public_key, Some(&self.config.private_key))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(Error::maintenance(message));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        response
            .json::<JsonValue>()
            .await
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            #[allow(clippy::cast_possible_truncation)]
            return Error::Timeout {
                timeout_ms: self.config.timeout.as_millis() as u64,
            };
        }
        if e.is_connect() {
            return Error::connection(e.to_string());
        }
        Error::Http(e)
    }

    async fn search_ids(&self, stream: &StreamDef, window: Window) -> Result<SearchResults> {
        let field = stream.search_field().ok_or_else(|| {
            Error::config(format!("stream '{}' cannot be searched by window", stream.name))
        })?;
        let url = self.resource_url(stream.resource, Some("advanced_search_ids"))?;

        let mut criteria = serde_json::Map::new();
        criteria.insert(
            field.to_string(),
            json!({
                "min": window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                "max": window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            }),
        );
        let body = json!({ "search": criteria });

        debug!("Searching {} ids in {}", stream.name, window);
        let response = self.execute(self.client.post(url).json(&body)).await?;
        let parsed: SearchIdsResponse = serde_json::from_value(response)
            .map_err(|e| Error::search_response(format!("invalid id search response: {e}")))?;
        Ok(parsed.search_results)
    }

    async fn fetch_page(
        &self,
        resource: &str,
        kind: EntityKind,
        ids: &[String],
    ) -> Result<Vec<Entity>> {
        let url = self.resource_url(resource, Some("advanced_search"))?;
        let body = json!({ "search": { "ids": ids } });

        debug!("Fetching {} {} records", ids.len(), resource);
        let response = self.execute(self.client.post(url).json(&body)).await?;
        decode_collection(kind, resource, &response)
    }
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchGateway for HttpGateway {
    async fn search(&self, stream: &StreamDef, window: Window) -> Result<Box<dyn ResultSet>> {
        let results = self.search_ids(stream, window).await?;
        let page_size = results
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        Ok(Box::new(PagedResultSet {
            gateway: self.clone(),
            resource: stream.resource,
            kind: stream.kind,
            ids: results.ids,
            page_size,
            cursor: 0,
            buffer: VecDeque::new(),
        }))
    }

    async fn all(&self, stream: &StreamDef) -> Result<Box<dyn ResultSet>> {
        let url = self.resource_url(stream.resource, None)?;
        let response = self.execute(self.client.get(url)).await?;
        let records = decode_collection(stream.kind, stream.resource, &response)?;
        Ok(Box::new(BufferedResultSet::new(records)))
    }
}

/// Result set that fetches one page of ids at a time
struct PagedResultSet {
    gateway: HttpGateway,
    resource: &'static str,
    kind: EntityKind,
    ids: Vec<String>,
    page_size: usize,
    cursor: usize,
    buffer: VecDeque<Entity>,
}

#[async_trait]
impl ResultSet for PagedResultSet {
    fn maximum_size(&self) -> usize {
        self.ids.len()
    }

    async fn next_record(&mut self) -> Result<Option<Entity>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.cursor >= self.ids.len() {
                return Ok(None);
            }

            let end = (self.cursor + self.page_size).min(self.ids.len());
            let page = self
                .gateway
                .fetch_page(self.resource, self.kind, &self.ids[self.cursor..end])
                .await?;
            self.cursor = end;
            self.buffer.extend(page);
        }
    }
}

fn decode_collection(kind: EntityKind, resource: &str, body: &JsonValue) -> Result<Vec<Entity>> {
    let items = body
        .get(resource)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| Error::search_response(format!("response has no '{resource}' list")))?;

    items.iter().map(|item| decode_record(kind, item)).collect()
}
