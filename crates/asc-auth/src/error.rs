//! Error types for credential operations
//!
//! This module defines the errors that can occur while loading App Store
//! Connect credentials and signing bearer tokens.

use thiserror::Error;

/// Credential error types.
///
/// Key and configuration errors surface at construction time. Once a
/// `CredentialManager` exists, only `Signing` can occur, and only if the
/// signing backend itself fails.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Private key file could not be read
    #[error("Failed to read private key file {path}: {message}")]
    KeyFile {
        /// Path that was read
        path: String,
        /// Underlying I/O error message
        message: String,
    },

    /// Private key is not a valid PEM-encoded P-256 key
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Token signing failed
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Whether this error can only happen while constructing credentials.
    ///
    /// Construction errors are fatal to the process; there is no point
    /// retrying them mid-session.
    pub fn is_construction_error(&self) -> bool {
        !matches!(self, AuthError::Signing(_))
    }

    /// Get error code for log output.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::KeyFile { .. } => "KEY_FILE",
            AuthError::InvalidKey(_) => "INVALID_KEY",
            AuthError::Signing(_) => "SIGNING_FAILED",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
