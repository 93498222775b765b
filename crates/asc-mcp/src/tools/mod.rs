//! App Store Connect MCP tools
//!
//! Each tool is a thin translation from MCP arguments to one upstream
//! request shape. Tools share an [`ApiContext`] holding the client and the
//! retry schedule used for reads.

pub mod apps;
pub mod builds;
pub mod testflight;

pub use apps::*;
pub use builds::*;
pub use testflight::*;

use crate::clients::{AppStoreClient, TransportError, TransportResult};
use crate::retry::{with_retry_if, RetryConfig};
use crate::server::{McpServerError, McpServerResult, Tool, ToolRegistry};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Items returned by list tools when no `limit` is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Largest `limit` a list tool accepts.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Shared state handed to every tool.
#[derive(Debug, Clone)]
pub struct ApiContext {
    client: Arc<AppStoreClient>,
    retry: RetryConfig,
}

impl ApiContext {
    /// Create a context.
    pub fn new(client: Arc<AppStoreClient>, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// Get the API client.
    pub fn client(&self) -> &AppStoreClient {
        &self.client
    }

    /// Run an idempotent read, retrying transient failures.
    pub async fn read<T, F, Fut>(&self, f: F) -> TransportResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        with_retry_if(&self.retry, f, TransportError::is_transient).await
    }
}

/// Get all App Store Connect tools.
pub fn all_tools(ctx: &ApiContext) -> Vec<Arc<dyn Tool>> {
    let mut tools = Vec::new();

    // Apps (2)
    tools.extend(app_tools(ctx));

    // Builds (1)
    tools.extend(build_tools(ctx));

    // TestFlight (3)
    tools.extend(testflight_tools(ctx));

    tools
}

/// Build a registry holding every tool.
pub fn registry(ctx: &ApiContext) -> McpServerResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register_all(all_tools(ctx))?;
    Ok(registry)
}

pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> McpServerResult<T> {
    serde_json::from_value(args).map_err(|e| McpServerError::InvalidParams(e.to_string()))
}

/// Check that an upstream resource id is safe to place in a URL path.
pub(crate) fn resource_id<'a>(field: &str, value: &'a str) -> McpServerResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(McpServerError::InvalidParams(format!("{} must not be empty", field)));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(McpServerError::InvalidParams(format!(
            "{} contains invalid characters: {}",
            field, value
        )));
    }
    Ok(value)
}

pub(crate) fn list_limit(limit: Option<u64>) -> McpServerResult<usize> {
    match limit {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(n) if n >= 1 && n <= MAX_LIST_LIMIT as u64 => Ok(n as usize),
        Some(n) => Err(McpServerError::InvalidParams(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIST_LIMIT, n
        ))),
    }
}

pub(crate) fn limit_schema() -> Value {
    serde_json::json!({
        "type": "integer",
        "description": "Maximum number of items to return",
        "minimum": 1,
        "maximum": MAX_LIST_LIMIT,
        "default": DEFAULT_LIST_LIMIT
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clients::ServiceEndpoint;
    use asc_auth::{ApiClaims, AuthResult, CredentialManager, SystemClock, TokenPolicy, TokenSigner};
    use std::time::Duration;

    struct StaticSigner;

    impl TokenSigner for StaticSigner {
        fn key_id(&self) -> &str {
            "TESTKEY"
        }

        fn sign(&self, _claims: &ApiClaims) -> AuthResult<String> {
            Ok("test-token".to_string())
        }
    }

    /// A context whose client points at an unroutable address.
    pub fn context() -> ApiContext {
        let credentials = CredentialManager::with_signer(
            "issuer",
            Arc::new(StaticSigner),
            Arc::new(SystemClock),
            TokenPolicy::default(),
        )
        .unwrap();
        let client = AppStoreClient::new(
            ServiceEndpoint::new("http://127.0.0.1:9"),
            Duration::from_secs(1),
            Arc::new(credentials),
        )
        .unwrap();
        ApiContext::new(Arc::new(client), RetryConfig::no_retry())
    }
}
