//! JWT signing for App Store Connect tokens
//!
//! Signing is a pure function from claims and a private key to a compact
//! token string. It sits behind [`TokenSigner`] so the caching logic in
//! [`crate::manager`] can be tested with a substitute backend.

use crate::claims::ApiClaims;
use crate::error::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::path::Path;

/// Produces signed tokens from a claim set.
pub trait TokenSigner: Send + Sync {
    /// Key identifier placed in the token header.
    fn key_id(&self) -> &str;

    /// Sign the claims and return the compact token.
    fn sign(&self, claims: &ApiClaims) -> AuthResult<String>;
}

/// ES256 (ECDSA P-256 / SHA-256) signer backed by jsonwebtoken.
pub struct Es256Signer {
    key_id: String,
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for Es256Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Es256Signer")
            .field("key_id", &self.key_id)
            .field("encoding_key", &"[REDACTED]")
            .finish()
    }
}

impl Es256Signer {
    /// Create a signer from PEM-encoded PKCS#8 key material.
    ///
    /// The key is exercised once with a throwaway claim set so that a key
    /// which parses as PEM but is not usable for ES256 is rejected here
    /// rather than on the first API call.
    ///
    /// # Arguments
    ///
    /// * `key_id` - Key identifier from App Store Connect
    /// * `pem` - Contents of the `.p8` file
    pub fn from_pem(key_id: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        let encoding_key = EncodingKey::from_ec_pem(pem)
            .map_err(|e| AuthError::InvalidKey(format!("Invalid EC private key: {}", e)))?;

        let signer = Self {
            key_id: key_id.into(),
            encoding_key,
        };

        let probe = ApiClaims::new("probe", Utc::now(), Duration::minutes(1));
        signer
            .sign(&probe)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        Ok(signer)
    }

    /// Create a signer by reading the key from a file.
    pub fn from_file(key_id: impl Into<String>, path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| AuthError::KeyFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_pem(key_id, &pem)
    }
}

impl TokenSigner for Es256Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn sign(&self, claims: &ApiClaims) -> AuthResult<String> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(format!("Token encoding failed: {}", e)))
    }
}
