//! Fulfillment API client implementation.
//!
//! This module provides the HTTP client for the fulfillment REST gateway.
//! Objects are exchanged wrapped as `{"object": ...}` under
//! `/api/fulfillment/v1/{collection}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ApiError, ConfigError, OsacError, Result};

use super::service::{ApiResult, CatalogService, ResourceService};
use super::types::{CatalogEntry, CatalogKind, Object, Resource};

/// Path prefix of every collection.
const API_PREFIX: &str = "api/fulfillment/v1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for idempotent requests.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Connection settings for the fulfillment API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API gateway.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            insecure: false,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Fulfillment API client.
#[derive(Debug, Clone)]
pub struct FulfillmentClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    endpoint: String,
    /// Parsed base URL that request paths are appended to.
    base: Url,
    /// Bearer token.
    token: Option<String>,
}

/// Request or response body wrapping a single object.
#[derive(Debug, Serialize, Deserialize)]
struct ObjectEnvelope<T> {
    object: T,
}

/// A single REST call.
#[derive(Debug)]
struct ApiRequest<'a> {
    method: Method,
    collection: &'a str,
    id: Option<&'a str>,
    body: Option<serde_json::Value>,
}

impl ApiRequest<'_> {
    /// GET and DELETE may be repeated without changing the outcome.
    fn is_idempotent(&self) -> bool {
        self.method == Method::GET || self.method == Method::DELETE
    }
}

impl FulfillmentClient {
    /// Creates a new fulfillment API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| {
                OsacError::Api(ApiError::network(format!(
                    "Failed to create HTTP client: {e}"
                )))
            })?;

        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let base = Url::parse(&endpoint)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ConfigError::validation(
                    format!("Invalid endpoint URL: {endpoint}"),
                    "provider.endpoint",
                )
            })?;

        Ok(Self {
            client,
            endpoint,
            base,
            token: config.token,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the request URL. Each part is a single percent-encoded path segment.
    fn url(&self, collection: &str, id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(API_PREFIX.split('/'))
                .push(collection)
                .extend(id);
        }
        url
    }

    /// Executes a request, retrying idempotent ones on transient failures.
    async fn execute(&self, request: &ApiRequest<'_>) -> ApiResult<String> {
        let attempts = if request.is_idempotent() { MAX_RETRIES } else { 1 };
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.execute_once(request).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::network("Max retries exceeded")))
    }

    /// Executes a single request and returns the raw response body.
    async fn execute_once(&self, request: &ApiRequest<'_>) -> ApiResult<String> {
        let url = self.url(request.collection, request.id);
        trace!("Executing {} {url}", request.method);

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");

        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(ApiError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ApiError::AuthenticationFailed {
                message: format!("{status} for {url}"),
            });
        }

        if status.as_u16() == 404 {
            return Err(ApiError::NotFound {
                collection: request.collection.to_string(),
                id: request.id.unwrap_or_default().to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::request_failed(status.as_u16(), body));
        }

        response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))
    }

    /// Sends an object and parses the object returned.
    async fn send_object<O>(
        &self,
        method: Method,
        collection: &str,
        id: Option<&str>,
        object: &O,
    ) -> ApiResult<O>
    where
        O: Serialize + DeserializeOwned + Sync,
    {
        let body = serde_json::to_value(ObjectEnvelope { object }).map_err(|e| {
            ApiError::Serialization {
                message: e.to_string(),
            }
        })?;

        let request = ApiRequest {
            method,
            collection,
            id,
            body: Some(body),
        };

        let body = self.execute(&request).await?;
        parse_object(&body)
    }

    /// Fetches a single object.
    async fn fetch_object<O: DeserializeOwned>(&self, collection: &str, id: &str) -> ApiResult<O> {
        let request = ApiRequest {
            method: Method::GET,
            collection,
            id: Some(id),
            body: None,
        };

        let body = self.execute(&request).await?;
        parse_object(&body)
    }
}

fn parse_object<O: DeserializeOwned>(body: &str) -> ApiResult<O> {
    serde_json::from_str::<ObjectEnvelope<O>>(body)
        .map(|envelope| envelope.object)
        .map_err(|e| ApiError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })
}

#[async_trait]
impl<K: Resource> ResourceService<K> for FulfillmentClient {
    async fn create(&self, object: &Object<K>) -> ApiResult<Object<K>> {
        debug!("Creating {} in {}", K::NAME, K::COLLECTION);
        self.send_object(Method::POST, K::COLLECTION, None, object)
            .await
    }

    async fn get(&self, id: &str) -> ApiResult<Object<K>> {
        self.fetch_object(K::COLLECTION, id).await
    }

    async fn update(&self, object: &Object<K>) -> ApiResult<Object<K>> {
        debug!("Updating {} {}", K::NAME, object.id);
        self.send_object(Method::PATCH, K::COLLECTION, Some(&object.id), object)
            .await
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        debug!("Deleting {} {id}", K::NAME);
        let request = ApiRequest {
            method: Method::DELETE,
            collection: K::COLLECTION,
            id: Some(id),
            body: None,
        };

        self.execute(&request).await.map(|_| ())
    }
}

#[async_trait]
impl CatalogService for FulfillmentClient {
    async fn get_entry(&self, kind: CatalogKind, id: &str) -> ApiResult<CatalogEntry> {
        self.fetch_object(kind.collection(), id).await
    }
}
