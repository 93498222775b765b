//! Upstream API access
//!
//! The App Store Connect HTTP client and the configuration it is built
//! from.
//!
//! ## Configuration
//!
//! The client is configured via environment variables:
//!
//! - `APP_STORE_CONNECT_ISSUER_ID`, `APP_STORE_CONNECT_KEY_ID` and
//!   `APP_STORE_CONNECT_P8_PATH`: API key credentials (required)
//! - `APP_STORE_CONNECT_BASE_URL`: API URL (default: https://api.appstoreconnect.apple.com)
//! - `APP_STORE_CONNECT_TIMEOUT_SECS`: Request timeout (default: 30)
//! - `APP_STORE_CONNECT_MAX_RETRIES`: Attempts for reads (default: 3)

pub mod app_store;
pub mod config;
pub mod document;

pub use app_store::{AppStoreClient, RequestPayload, TransportError, TransportResult, MAX_PAGE_SIZE};
pub use config::{ConfigError, ServiceConfig, ServiceEndpoint, DEFAULT_BASE_URL};
pub use document::{Document, ErrorDocument, ErrorObject, Page, PageLinks, Resource};
