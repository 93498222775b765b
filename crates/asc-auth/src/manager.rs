//! Bearer token lifecycle
//!
//! [`CredentialManager`] owns the App Store Connect credentials and hands out
//! a signed token on demand. The token is created lazily, cached, and
//! regenerated in place once it gets within the refresh margin of expiry.

use crate::claims::{ApiClaims, MAX_TOKEN_LIFETIME_MINUTES};
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::jwt::{Es256Signer, TokenSigner};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// App Store Connect API key credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Issuer id shown on the App Store Connect keys page
    pub issuer_id: String,

    /// Key id of the API key
    pub key_id: String,

    /// Path to the downloaded `.p8` private key
    pub private_key_path: PathBuf,
}

impl Credentials {
    /// Create credentials.
    pub fn new(
        issuer_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            key_id: key_id.into(),
            private_key_path: private_key_path.into(),
        }
    }

    /// Check that all fields are present and the key file exists.
    pub fn validate(&self) -> AuthResult<()> {
        if self.issuer_id.trim().is_empty() {
            return Err(AuthError::ConfigError("issuer id must not be empty".to_string()));
        }
        if self.key_id.trim().is_empty() {
            return Err(AuthError::ConfigError("key id must not be empty".to_string()));
        }
        if !self.private_key_path.is_file() {
            return Err(AuthError::KeyFile {
                path: self.private_key_path.display().to_string(),
                message: "file does not exist".to_string(),
            });
        }
        Ok(())
    }
}

/// Lifetime and refresh margin for issued tokens.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    /// How long a freshly signed token is valid
    pub lifetime: Duration,

    /// Tokens closer than this to expiry are regenerated
    pub refresh_margin: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::minutes(MAX_TOKEN_LIFETIME_MINUTES),
            refresh_margin: Duration::seconds(60),
        }
    }
}

impl TokenPolicy {
    /// Clamp the lifetime to the upstream maximum and reject policies under
    /// which a fresh token would already be stale.
    pub fn validated(self) -> AuthResult<Self> {
        let lifetime = self
            .lifetime
            .min(Duration::minutes(MAX_TOKEN_LIFETIME_MINUTES));

        if self.refresh_margin < Duration::zero() {
            return Err(AuthError::ConfigError(
                "refresh margin must not be negative".to_string(),
            ));
        }
        if lifetime <= self.refresh_margin {
            return Err(AuthError::ConfigError(format!(
                "token lifetime ({}s) must exceed the refresh margin ({}s)",
                lifetime.num_seconds(),
                self.refresh_margin.num_seconds()
            )));
        }

        Ok(Self {
            lifetime,
            refresh_margin: self.refresh_margin,
        })
    }
}

/// A signed bearer token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    /// The compact token string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the upstream stops accepting this token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether more than `margin` remains before expiry.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - now > margin
    }
}

/// Signs and caches App Store Connect bearer tokens.
///
/// Safe to share between tasks. The freshness check and any regeneration
/// happen under one lock, so concurrent callers never sign twice for the
/// same window and never observe a half-written cache.
pub struct CredentialManager {
    issuer_id: String,
    signer: Arc<dyn TokenSigner>,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
    cached: Mutex<Option<Token>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("issuer_id", &self.issuer_id)
            .field("key_id", &self.signer.key_id())
            .field("policy", &self.policy)
            .finish()
    }
}

impl CredentialManager {
    /// Load the private key and create a manager with the default policy.
    ///
    /// Fails if the key file is missing or does not hold a usable P-256
    /// key. After this returns, token generation does not fail under
    /// normal operation.
    pub fn new(credentials: Credentials) -> AuthResult<Self> {
        Self::with_policy(credentials, TokenPolicy::default())
    }

    /// Load the private key and create a manager with a custom policy.
    pub fn with_policy(credentials: Credentials, policy: TokenPolicy) -> AuthResult<Self> {
        credentials.validate()?;
        let signer = Es256Signer::from_file(&credentials.key_id, &credentials.private_key_path)?;
        Self::with_signer(
            credentials.issuer_id,
            Arc::new(signer),
            Arc::new(SystemClock),
            policy,
        )
    }

    /// Create a manager from explicit parts.
    pub fn with_signer(
        issuer_id: impl Into<String>,
        signer: Arc<dyn TokenSigner>,
        clock: Arc<dyn Clock>,
        policy: TokenPolicy,
    ) -> AuthResult<Self> {
        Ok(Self {
            issuer_id: issuer_id.into(),
            signer,
            clock,
            policy: policy.validated()?,
            cached: Mutex::new(None),
        })
    }

    /// Get the issuer id.
    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    /// Return a token with at least the refresh margin left.
    pub async fn token(&self) -> AuthResult<Token> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now, self.policy.refresh_margin) {
                return Ok(token.clone());
            }
        }

        let claims = ApiClaims::new(&self.issuer_id, now, self.policy.lifetime);
        let token = Token {
            value: self.signer.sign(&claims)?,
            expires_at: claims.expires_at(),
        };

        debug!(
            key_id = %self.signer.key_id(),
            expires_at = %token.expires_at,
            "Signed new App Store Connect token"
        );

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Convenience for callers that only need the token string.
    pub async fn bearer_token(&self) -> AuthResult<String> {
        Ok(self.token().await?.value)
    }
}
