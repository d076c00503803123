//! Per-request description handed to the pipeline.

use crate::{ApiError, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::time::Duration;

/// Header carrying a per-call timeout override, in milliseconds.
///
/// Consumed by the pipeline; never sent upstream.
pub const TIMEOUT_OVERRIDE_HEADER: &str = "x-request-timeout";

/// Header carrying a per-call retry count override.
///
/// Consumed by the pipeline; never sent upstream.
pub const RETRIES_OVERRIDE_HEADER: &str = "x-request-retries";

/// The operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `GET {path}?query`. The page window is needed to build pagination.
    Search { page: u32, limit: u32 },
    /// `GET {path}/{id}`
    Read,
    /// `POST {path}`
    Create,
    /// `PATCH {path}/{id}`
    Update,
    /// `DELETE {path}/{id}`
    Remove,
}

impl Operation {
    pub fn method(&self) -> Method {
        match self {
            Operation::Search { .. } | Operation::Read => Method::GET,
            Operation::Create => Method::POST,
            Operation::Update => Method::PATCH,
            Operation::Remove => Method::DELETE,
        }
    }

    /// Returns `true` if repeating the operation cannot duplicate side effects.
    ///
    /// Non-idempotent operations are only retried when the caller overrides
    /// the retry count explicitly.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Operation::Create | Operation::Update)
    }
}

/// Everything the pipeline needs to issue one logical call.
///
/// # Examples
///
/// ```
/// use apiary::metadata::{Operation, RequestMetadata};
/// use std::time::Duration;
///
/// let metadata = RequestMetadata::new(Operation::Read, "items")
///     .with_id("42")
///     .with_timeout_override(Duration::from_secs(1))
///     .with_retries_override(5);
///
/// assert_eq!(metadata.id.as_deref(), Some("42"));
/// assert_eq!(metadata.headers.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    pub operation: Operation,

    /// Logical endpoint name, resolved through the registry.
    pub endpoint: String,

    /// Resource id appended as the last path segment.
    pub id: Option<String>,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters, sent in order.
    pub query: Vec<(String, String)>,
}

impl RequestMetadata {
    pub fn new(operation: Operation, endpoint: impl Into<String>) -> Self {
        Self {
            operation,
            endpoint: endpoint.into(),
            id: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ApiError::validation(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ApiError::validation(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_query_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// Overrides the endpoint timeout for this call only.
    pub fn with_timeout_override(mut self, timeout: Duration) -> Self {
        self.headers.insert(
            HeaderName::from_static(TIMEOUT_OVERRIDE_HEADER),
            HeaderValue::from(timeout.as_millis().min(u64::MAX as u128) as u64),
        );
        self
    }

    /// Overrides the retry count for this call only.
    pub fn with_retries_override(mut self, retries: u32) -> Self {
        self.headers.insert(
            HeaderName::from_static(RETRIES_OVERRIDE_HEADER),
            HeaderValue::from(retries),
        );
        self
    }
}

/// Timeout and retry overrides read from the override headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Overrides {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

impl Overrides {
    /// Removes the override headers from `headers` and parses them.
    pub(crate) fn take_from(headers: &mut HeaderMap) -> Result<Self> {
        let timeout = take_number::<u64>(headers, TIMEOUT_OVERRIDE_HEADER)?.map(Duration::from_millis);
        let retries = take_number::<u32>(headers, RETRIES_OVERRIDE_HEADER)?;
        Ok(Self { timeout, retries })
    }
}

fn take_number<N: std::str::FromStr>(headers: &mut HeaderMap, name: &str) -> Result<Option<N>> {
    let Some(value) = headers.remove(name) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<N>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::validation(format!("Header {} must be a non-negative integer", name)))
}
