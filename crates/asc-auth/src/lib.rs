//! # App Store Connect Authentication
//!
//! This crate signs and caches the bearer tokens the App Store Connect API
//! requires on every request.
//!
//! ## Overview
//!
//! The asc-auth crate handles:
//! - **Credentials**: Issuer id, key id and the `.p8` private key path
//! - **Claims**: The compact claim set accepted upstream
//! - **Signing**: ES256 signing behind the `TokenSigner` trait
//! - **Caching**: Lazy creation and refresh ahead of expiry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use asc_auth::{CredentialManager, Credentials};
//!
//! async fn example() -> Result<(), asc_auth::AuthError> {
//!     let credentials = Credentials::new(
//!         "57246542-96fe-1a63-e053-0824d011072a",
//!         "2X9R4HXF34",
//!         "/path/to/AuthKey_2X9R4HXF34.p8",
//!     );
//!
//!     // Fails here, not later, if the key is unusable
//!     let manager = CredentialManager::new(credentials)?;
//!
//!     let token = manager.bearer_token().await?;
//!     println!("Authorization: Bearer {}", token);
//!     Ok(())
//! }
//! ```
//!
//! ## Token Lifecycle
//!
//! Tokens live for 20 minutes, the upstream maximum. A cached token is
//! reused until less than 60 seconds remain, then replaced in place.
//! Nothing is persisted.

pub mod claims;
pub mod clock;
pub mod error;
pub mod jwt;
pub mod manager;

// Re-export main types
pub use claims::{ApiClaims, APP_STORE_CONNECT_AUDIENCE, MAX_TOKEN_LIFETIME_MINUTES};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, AuthResult};
pub use jwt::{Es256Signer, TokenSigner};
pub use manager::{CredentialManager, Credentials, Token, TokenPolicy};
