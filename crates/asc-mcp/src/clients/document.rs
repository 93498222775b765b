//! JSON:API envelope pieces used by the App Store Connect API.
//!
//! Only the members the transport needs are modeled: `data`, `links.next`,
//! `meta.paging` and the `errors` array. Resource attributes stay as raw
//! JSON for the tools to pick from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single-resource response.
#[derive(Debug, Clone, Deserialize)]
pub struct Document<T> {
    /// Primary data
    pub data: T,
}

/// One page of a collection response.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub data: Vec<T>,

    /// Pagination links
    #[serde(default)]
    pub links: Option<PageLinks>,

    /// Paging metadata
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

impl<T> Page<T> {
    /// Absolute URL of the next page, if any.
    pub fn next(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.next.as_deref())
    }
}

/// Links object of a collection response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLinks {
    /// This page
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,

    /// Next page
    #[serde(default)]
    pub next: Option<String>,
}

/// Meta object of a collection response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    /// Paging information
    #[serde(default)]
    pub paging: Option<Paging>,
}

/// Paging information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    /// Total items across all pages
    #[serde(default)]
    pub total: Option<u64>,

    /// Page size
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A resource object with untyped attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Resource id
    pub id: String,

    /// Resource type (e.g. `apps`, `builds`)
    #[serde(rename = "type")]
    pub kind: String,

    /// Attributes
    #[serde(default)]
    pub attributes: Value,
}

impl Resource {
    /// Read a string attribute.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Error response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDocument {
    /// Individual errors
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

/// One entry of an error response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorObject {
    /// HTTP status as a string
    #[serde(default)]
    pub status: Option<String>,

    /// Machine-readable code (e.g. `NOT_AUTHORIZED`)
    #[serde(default)]
    pub code: Option<String>,

    /// Short summary
    #[serde(default)]
    pub title: Option<String>,

    /// Human-readable explanation
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorObject {
    /// Render as "title: detail", falling back to whichever part exists.
    pub fn summary(&self) -> Option<String> {
        match (self.title.as_deref(), self.detail.as_deref(), self.code.as_deref()) {
            (Some(title), Some(detail), _) => Some(format!("{}: {}", title, detail)),
            (Some(title), None, _) => Some(title.to_string()),
            (None, Some(detail), _) => Some(detail.to_string()),
            (None, None, Some(code)) => Some(code.to_string()),
            (None, None, None) => None,
        }
    }
}

/// Extract a readable detail string from an error response body.
///
/// Uses the `errors` array when the body is a JSON:API error document,
/// otherwise the trimmed body text.
pub fn error_detail(body: &[u8]) -> Option<String> {
    if let Ok(doc) = serde_json::from_slice::<ErrorDocument>(body) {
        let parts: Vec<String> = doc.errors.iter().filter_map(ErrorObject::summary).collect();
        if !parts.is_empty() {
            return Some(parts.join("; "));
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
