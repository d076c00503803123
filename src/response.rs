//! Response envelopes.
//!
//! Every successful call returns either an [`ApiResponse`] or, for searches, an
//! [`ApiSearchResponse`]. Upstream services may answer with a bare payload or
//! with a body that is already enveloped; [`wrap`] and [`wrap_search`] bring
//! both into the same shape, and leave an existing envelope untouched so that
//! wrapping twice equals wrapping once.

use crate::{ApiError, Result, SortDirection};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponseMetadata {
    /// Metadata for a response received now with `status`.
    pub fn now(status: StatusCode) -> Self {
        Self {
            timestamp: Utc::now(),
            status_code: status.as_u16(),
            message: None,
        }
    }
}

/// A single-resource envelope.
///
/// # Examples
///
/// ```
/// use apiary::response::{ApiResponse, ResponseMetadata};
/// use http::StatusCode;
///
/// let response = ApiResponse::new(42, ResponseMetadata::now(StatusCode::OK));
/// let text = response.map(|n| n.to_string());
/// assert_eq!(text.data, "42");
/// assert_eq!(text.metadata.status_code, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub metadata: ResponseMetadata,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, metadata: ResponseMetadata) -> Self {
        Self { data, metadata }
    }

    /// Maps the payload, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> ApiResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        ApiResponse {
            data: f(self.data),
            metadata: self.metadata,
        }
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Decodes an envelope produced by [`wrap`].
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        decode(envelope)
    }
}

impl<T> AsRef<T> for ApiResponse<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for ApiResponse<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Pagination details of a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl Pagination {
    /// Computes `pages = ceil(total / limit)`, or `0` when there are no results.
    ///
    /// ```
    /// use apiary::response::Pagination;
    ///
    /// assert_eq!(Pagination::new(0, 1, 10).pages, 0);
    /// assert_eq!(Pagination::new(23, 1, 10).pages, 3);
    /// ```
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let pages = if total > 0 && limit > 0 {
            total.div_ceil(u64::from(limit))
        } else {
            0
        };

        Self {
            total,
            page,
            limit,
            pages,
        }
    }
}

/// A sort column echoed back by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub column: String,
    pub order: SortDirection,
}

/// A search result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, G: Serialize",
    deserialize = "T: Deserialize<'de>, G: Deserialize<'de>"
))]
pub struct ApiSearchResponse<T, G = Value> {
    pub data: Vec<T>,
    pub metadata: ResponseMetadata,
    pub pagination: Pagination,
    #[serde(default)]
    pub groups: Vec<G>,
    #[serde(default)]
    pub sort: Vec<SortColumn>,
}

impl<T, G> ApiSearchResponse<T, G> {
    /// Returns `true` if a page after the current one exists.
    pub fn has_next_page(&self) -> bool {
        u64::from(self.pagination.page) < self.pagination.pages
    }

    /// Returns `true` if this page holds no items.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: DeserializeOwned, G: DeserializeOwned> ApiSearchResponse<T, G> {
    /// Decodes an envelope produced by [`wrap_search`].
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        decode(envelope)
    }
}

fn decode<R: DeserializeOwned>(envelope: Value) -> Result<R> {
    R::deserialize(&envelope).map_err(|e| {
        ApiError::unexpected(format!("Failed to decode response: {}", e)).with_details(envelope)
    })
}

/// True when `metadata` looks like a [`ResponseMetadata`] rather than a
/// resource field that happens to share the name.
fn has_metadata(body: &Map<String, Value>) -> bool {
    body.get("metadata")
        .and_then(Value::as_object)
        .is_some_and(|meta| meta.contains_key("timestamp") && meta.contains_key("statusCode"))
}

fn is_envelope(body: &Map<String, Value>) -> bool {
    body.contains_key("data") && has_metadata(body)
}

fn metadata_value(status: StatusCode) -> Value {
    serde_json::to_value(ResponseMetadata::now(status)).unwrap_or(Value::Null)
}

/// Wraps a single-resource body into `{data, metadata}`.
///
/// Bodies that are already `{data, metadata}` envelopes are returned unchanged.
pub fn wrap(body: Value, status: StatusCode) -> Value {
    if let Value::Object(map) = &body {
        if is_envelope(map) {
            return body;
        }
    }

    let mut envelope = Map::new();
    envelope.insert("data".to_string(), body);
    envelope.insert("metadata".to_string(), metadata_value(status));
    Value::Object(envelope)
}

/// Wraps a search body into `{data, metadata, pagination, groups, sort}`.
///
/// Accepts a bare array, or an object with `data` and optionally `total`,
/// `groups`, `sort`, and `metadata`. A missing `total` counts the items
/// received. Bodies that already carry both `metadata` and `pagination` are
/// returned unchanged.
pub fn wrap_search(body: Value, status: StatusCode, page: u32, limit: u32) -> Value {
    let mut envelope = match body {
        Value::Object(map) if map.contains_key("data") => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };

    if has_metadata(&envelope) && envelope.contains_key("pagination") {
        return Value::Object(envelope);
    }

    let data = match envelope.remove("data") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(item) => vec![item],
    };

    let total = envelope
        .remove("total")
        .and_then(|total| total.as_u64())
        .unwrap_or(data.len() as u64);

    envelope.insert("data".to_string(), Value::Array(data));

    if !has_metadata(&envelope) {
        envelope.insert("metadata".to_string(), metadata_value(status));
    }

    if !envelope.contains_key("pagination") {
        let pagination = serde_json::to_value(Pagination::new(total, page, limit))
            .unwrap_or(Value::Null);
        envelope.insert("pagination".to_string(), pagination);
    }

    for key in ["groups", "sort"] {
        let entry = envelope.entry(key).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::Array(Vec::new());
        }
    }

    Value::Object(envelope)
}
