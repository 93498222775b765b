//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use asc_auth::{ApiClaims, AuthResult, CredentialManager, SystemClock, TokenPolicy, TokenSigner};
use asc_mcp::clients::{AppStoreClient, ServiceEndpoint};
use asc_mcp::{ApiContext, RetryConfig};
use std::sync::Arc;
use std::time::Duration;

/// Bearer value produced by [`StaticSigner`].
pub const TEST_TOKEN: &str = "test-token";

/// Signer that returns a fixed token.
pub struct StaticSigner;

impl TokenSigner for StaticSigner {
    fn key_id(&self) -> &str {
        "TESTKEY01"
    }

    fn sign(&self, _claims: &ApiClaims) -> AuthResult<String> {
        Ok(TEST_TOKEN.to_string())
    }
}

/// Path of the P-256 test key shipped with asc-auth.
pub fn fixture_key_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../asc-auth/tests/fixtures/test_key.p8")
}

/// Credential manager issuing [`TEST_TOKEN`].
pub fn static_credentials() -> Arc<CredentialManager> {
    Arc::new(
        CredentialManager::with_signer(
            "test-issuer",
            Arc::new(StaticSigner),
            Arc::new(SystemClock),
            TokenPolicy::default(),
        )
        .unwrap(),
    )
}

/// Client for a mock server base URL.
pub fn client(base_url: &str) -> AppStoreClient {
    AppStoreClient::new(
        ServiceEndpoint::new(base_url),
        Duration::from_secs(5),
        static_credentials(),
    )
    .unwrap()
}

/// Retry schedule with millisecond delays.
pub fn quick_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

/// Tool context for a mock server base URL.
pub fn context(base_url: &str, retry: RetryConfig) -> ApiContext {
    ApiContext::new(Arc::new(client(base_url)), retry)
}

/// A JSON:API resource object.
pub fn resource(kind: &str, id: &str, attributes: serde_json::Value) -> serde_json::Value {
    serde_json::json!({"type": kind, "id": id, "attributes": attributes})
}
