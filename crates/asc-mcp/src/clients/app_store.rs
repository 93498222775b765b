//! App Store Connect API client.
//!
//! HTTP transport for the App Store Connect REST API. Every request carries
//! a bearer token from the [`CredentialManager`]; collection reads follow
//! `links.next` until the caller's item limit is met.
//!
//! The client never retries. Callers that want retries wrap a call with
//! [`crate::retry::with_retry_if`] and decide for themselves whether the
//! request is safe to repeat.

use super::config::ServiceEndpoint;
use super::document::{error_detail, Document, Page};
use asc_auth::{AuthError, CredentialManager};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Largest page size the API accepts.
pub const MAX_PAGE_SIZE: usize = 200;

/// Transport errors.
///
/// `Rejected` means the API answered and refused; `Unreachable` means no
/// usable answer arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    /// API returned a non-2xx status.
    #[error("App Store Connect rejected the request ({status}): {detail}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error detail from the API, or the status text.
        detail: String,
    },

    /// Connection failure, timeout or interrupted body.
    #[error("Could not reach App Store Connect: {0}")]
    Unreachable(String),

    /// Response body was not the expected JSON.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Token could not be produced.
    #[error("Credential error: {0}")]
    Credentials(#[from] AuthError),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Unreachable(e.to_string())
        }
    }

    /// HTTP status for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the API refused the request.
    pub fn is_rejected(&self) -> bool {
        matches!(self, TransportError::Rejected { .. })
    }

    /// Whether repeating the same request could succeed.
    ///
    /// True for connectivity failures, rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Unreachable(_) => true,
            TransportError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Query string or body for one request.
#[derive(Debug, Clone, Default)]
pub enum RequestPayload {
    /// No payload.
    #[default]
    None,
    /// Query parameters (reads).
    Query(Vec<(String, String)>),
    /// JSON body (writes).
    Body(Value),
}

impl RequestPayload {
    /// Build query parameters from string pairs.
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        RequestPayload::Query(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// App Store Connect client.
#[derive(Clone)]
pub struct AppStoreClient {
    /// HTTP client instance.
    client: Client,

    /// API endpoint configuration.
    endpoint: ServiceEndpoint,

    /// Parsed base URL, used to vet pagination links.
    base_url: Url,

    /// Token source.
    credentials: Arc<CredentialManager>,
}

impl std::fmt::Debug for AppStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStoreClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AppStoreClient {
    /// Create a new client.
    pub fn new(
        endpoint: ServiceEndpoint,
        timeout: Duration,
        credentials: Arc<CredentialManager>,
    ) -> TransportResult<Self> {
        let base_url = Url::parse(&endpoint.base_url)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid base URL: {}", e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("asc-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            base_url,
            credentials,
        })
    }

    /// Get the endpoint configuration.
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Perform one authenticated request.
    ///
    /// Returns `None` when the response has no body (e.g. `204 No Content`).
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: RequestPayload,
    ) -> TransportResult<Option<Value>> {
        let url = self.url(path)?;
        self.send(method, url, &payload).await
    }

    /// Fetch a single resource.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: RequestPayload,
    ) -> TransportResult<T> {
        let value = self
            .execute(Method::GET, path, query)
            .await?
            .ok_or_else(|| TransportError::InvalidResponse("empty response body".to_string()))?;
        let document: Document<T> = decode(value)?;
        Ok(document.data)
    }

    /// Fetch up to `limit` items of a collection, following `links.next`.
    ///
    /// Any `limit` already present in `query` is replaced by
    /// `min(limit, MAX_PAGE_SIZE)`. Stops when enough items have been
    /// collected, when there is no next page, or when a page comes back
    /// empty.
    #[instrument(skip_all, fields(path = %path, limit = limit))]
    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: RequestPayload,
        limit: usize,
    ) -> TransportResult<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut params = match query {
            RequestPayload::Query(params) => params,
            RequestPayload::None => Vec::new(),
            RequestPayload::Body(_) => {
                return Err(TransportError::InvalidRequest(
                    "collection reads take query parameters, not a body".to_string(),
                ))
            }
        };
        params.retain(|(key, _)| key != "limit");
        params.push(("limit".to_string(), limit.min(MAX_PAGE_SIZE).to_string()));

        let mut url = self.url(path)?;
        let mut payload = RequestPayload::Query(params);
        let mut items: Vec<T> = Vec::new();
        let mut pages = 0usize;

        loop {
            let value = self
                .send(Method::GET, url, &payload)
                .await?
                .ok_or_else(|| TransportError::InvalidResponse("empty collection response".to_string()))?;
            let page: Page<T> = decode(value)?;
            pages += 1;

            let page_len = page.data.len();
            let next = page.next().map(str::to_string);
            items.extend(page.data);

            if items.len() >= limit {
                items.truncate(limit);
                break;
            }

            match next {
                Some(_) if page_len == 0 => {
                    warn!(pages, "Empty page with a next link; stopping");
                    break;
                }
                Some(next) => {
                    // The next link already carries the cursor and limit.
                    url = self.pagination_url(&next)?;
                    payload = RequestPayload::None;
                }
                None => break,
            }
        }

        debug!(pages, items = items.len(), "Collection read complete");
        Ok(items)
    }

    /// Create a resource.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> TransportResult<T> {
        let value = self
            .execute(Method::POST, path, RequestPayload::Body(body))
            .await?
            .ok_or_else(|| TransportError::InvalidResponse("empty response body".to_string()))?;
        let document: Document<T> = decode(value)?;
        Ok(document.data)
    }

    /// Modify a resource.
    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: Value) -> TransportResult<T> {
        let value = self
            .execute(Method::PATCH, path, RequestPayload::Body(body))
            .await?
            .ok_or_else(|| TransportError::InvalidResponse("empty response body".to_string()))?;
        let document: Document<T> = decode(value)?;
        Ok(document.data)
    }

    /// Delete a resource.
    pub async fn delete(&self, path: &str) -> TransportResult<()> {
        self.execute(Method::DELETE, path, RequestPayload::None)
            .await
            .map(|_| ())
    }

    fn url(&self, path: &str) -> TransportResult<Url> {
        let raw = self.endpoint.url(path);
        Url::parse(&raw).map_err(|e| TransportError::InvalidRequest(format!("{}: {}", raw, e)))
    }

    /// Validate a `links.next` value before any token is sent to it.
    fn pagination_url(&self, next: &str) -> TransportResult<Url> {
        let url = Url::parse(next)
            .map_err(|e| TransportError::InvalidResponse(format!("bad next link {}: {}", next, e)))?;

        if url.origin() != self.base_url.origin() {
            return Err(TransportError::InvalidResponse(format!(
                "next link points outside the API host: {}",
                next
            )));
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        payload: &RequestPayload,
    ) -> TransportResult<Option<Value>> {
        let token = self.credentials.bearer_token().await?;

        let mut request = self.client.request(method, url).bearer_auth(token);
        match payload {
            RequestPayload::None => {}
            RequestPayload::Query(params) => request = request.query(params),
            RequestPayload::Body(body) => request = request.json(body),
        }

        let response = request.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status();
        let body = response.bytes().await.map_err(TransportError::from_reqwest)?;

        if !status.is_success() {
            let detail = error_detail(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown error")
                    .to_string()
            });
            warn!(status = status.as_u16(), %detail, "App Store Connect API error");
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> TransportResult<T> {
    serde_json::from_value(value).map_err(|e| TransportError::InvalidResponse(e.to_string()))
}
