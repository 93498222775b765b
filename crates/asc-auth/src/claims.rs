//! JWT claims for App Store Connect API tokens
//!
//! App Store Connect accepts a compact claim set: issuer, audience,
//! issued-at and expiry. Anything else is ignored or rejected upstream.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Audience value the upstream API expects in every token.
pub const APP_STORE_CONNECT_AUDIENCE: &str = "appstoreconnect-v1";

/// Longest token lifetime the upstream API accepts.
pub const MAX_TOKEN_LIFETIME_MINUTES: i64 = 20;

/// Claims carried by an App Store Connect bearer token.
///
/// # Example
///
/// ```rust
/// use asc_auth::claims::ApiClaims;
/// use chrono::{Duration, Utc};
///
/// let claims = ApiClaims::new("57246542-96fe-1a63-e053-0824d011072a", Utc::now(), Duration::minutes(20));
/// assert_eq!(claims.aud, "appstoreconnect-v1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClaims {
    /// Issuer (team issuer id from App Store Connect)
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Audience (always `appstoreconnect-v1`)
    pub aud: String,
}

impl ApiClaims {
    /// Create claims issued at `now` and valid for `lifetime`.
    pub fn new(issuer_id: impl Into<String>, now: DateTime<Utc>, lifetime: Duration) -> Self {
        let iat = now.timestamp();
        Self {
            iss: issuer_id.into(),
            iat,
            exp: iat + lifetime.num_seconds(),
            aud: APP_STORE_CONNECT_AUDIENCE.to_string(),
        }
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Issued-at as a timestamp.
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
