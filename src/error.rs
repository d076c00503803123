//! The error model shared by every request.
//!
//! All failures, whether raised before a request is sent (bad configuration,
//! invalid parameters) or produced by the transport, are normalized into a
//! single [`ApiError`] value. The value is immutable, cloneable, and
//! serializable so it can be logged, stored, or forwarded independently of how
//! it was signaled.

use crate::rate_limit::RateLimitInfo;
use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Message shown to end users when the server cannot be reached.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Please check your network connection and try again.";

/// Classification of an [`ApiError`].
///
/// The kind drives the retry decision: only `Timeout`, `Network`,
/// `RateLimited`, and `Server` are transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An endpoint name or client setting is missing or invalid.
    Configuration,
    /// Request parameters were rejected before anything was sent.
    Validation,
    /// An attempt exceeded its deadline.
    Timeout,
    /// The request never produced an HTTP status (connection refused, DNS, ...).
    Network,
    /// 4xx other than 429.
    Client,
    /// 429 Too Many Requests.
    RateLimited,
    /// 5xx.
    Server,
    /// Anything that could not be classified, including undecodable bodies.
    Unexpected,
}

impl ErrorKind {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => ErrorKind::RateLimited,
            400..=499 => ErrorKind::Client,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unexpected,
        }
    }

    /// Returns `true` for kinds that may succeed when tried again.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Network | ErrorKind::RateLimited | ErrorKind::Server
        )
    }
}

/// A normalized API failure.
///
/// # Examples
///
/// ```
/// use apiary::{ApiError, ErrorKind};
/// use http::{HeaderMap, StatusCode};
///
/// let err = ApiError::from_http(
///     StatusCode::NOT_FOUND,
///     "https://api.example.com/items/7",
///     r#"{"message":"Item not found","code":"ITEM_MISSING"}"#,
///     &HeaderMap::new(),
/// );
///
/// assert_eq!(err.kind(), ErrorKind::Client);
/// assert_eq!(err.status(), 404);
/// assert_eq!(err.code(), Some("ITEM_MISSING"));
/// assert_eq!(err.message(), "Item not found");
/// assert!(!err.is_retryable());
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message} (status {status})")]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    #[serde(skip)]
    rate_limit_info: Option<RateLimitInfo>,
}

impl ApiError {
    /// Creates an error of the given kind, stamped with the current time.
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
            code: None,
            path: None,
            timestamp: Utc::now(),
            details: None,
            rate_limit_info: None,
        }
    }

    /// An unknown endpoint or invalid client setting. Never retried.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, 500, message).with_code("CONFIGURATION_ERROR")
    }

    /// Malformed request parameters. Never retried.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, 400, message).with_code("VALIDATION_ERROR")
    }

    /// An attempt against `path` ran longer than `timeout`.
    pub fn timeout(path: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            0,
            format!("Request timed out after {}ms", timeout.as_millis()),
        )
        .with_code("TIMEOUT")
        .with_path(path)
    }

    /// A failure with no HTTP status. `code` is `NETWORK_ERROR` or `CLIENT_ERROR`.
    pub fn network(path: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, 0, message)
            .with_code(code)
            .with_path(path)
    }

    /// Anything that does not fit the taxonomy.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, 500, message).with_code("UNEXPECTED_ERROR")
    }

    /// Normalizes a non-success HTTP response.
    ///
    /// The body is parsed as JSON when possible: `code` and `message` (or
    /// `error`) are lifted from it and the parsed body becomes `details`. Plain
    /// text bodies are kept verbatim in `details`.
    pub fn from_http(status: StatusCode, path: &str, raw_body: &str, headers: &HeaderMap) -> Self {
        let parsed = serde_json::from_str::<Value>(raw_body).ok();

        let code = parsed
            .as_ref()
            .and_then(|body| body.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP_{}", status.as_u16()));

        let message = parsed
            .as_ref()
            .and_then(|body| body.get("message").or_else(|| body.get("error")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| match status.canonical_reason() {
                Some(reason) => format!("HTTP error {} {}", status.as_u16(), reason),
                None => format!("HTTP error {}", status.as_u16()),
            });

        let details = match parsed {
            Some(body) => Some(body),
            None if !raw_body.is_empty() => Some(Value::String(raw_body.to_string())),
            None => None,
        };

        let info = RateLimitInfo::from_headers(headers);

        Self {
            kind: ErrorKind::from_status(status),
            message,
            status: status.as_u16(),
            code: Some(code),
            path: Some(path.to_string()),
            timestamp: Utc::now(),
            details,
            rate_limit_info: (!info.is_empty()).then_some(info),
        }
    }

    /// Normalizes a transport error raised by `reqwest`.
    pub fn from_transport(error: reqwest::Error, path: &str) -> Self {
        if error.is_timeout() {
            return Self::new(ErrorKind::Timeout, 0, error.to_string())
                .with_code("TIMEOUT")
                .with_path(path);
        }

        if let Some(status) = error.status() {
            return Self::new(ErrorKind::from_status(status), status.as_u16(), error.to_string())
                .with_code(format!("HTTP_{}", status.as_u16()))
                .with_path(path);
        }

        if error.is_connect() || error.is_request() {
            Self::network(path, "NETWORK_ERROR", error.to_string())
        } else if error.is_builder() || error.is_body() || error.is_decode() {
            Self::network(path, "CLIENT_ERROR", error.to_string())
        } else {
            Self::unexpected(error.to_string()).with_path(path)
        }
    }

    /// Sets the machine-readable code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the request URL the error belongs to.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attaches diagnostic details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Replaces the message with [`NETWORK_ERROR_MESSAGE`].
    ///
    /// The original message moves into `details` when there are none yet.
    pub fn with_connectivity_message(mut self) -> Self {
        let original = std::mem::replace(&mut self.message, NETWORK_ERROR_MESSAGE.to_string());
        if self.details.is_none() {
            self.details = Some(Value::String(original));
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The HTTP status, `0` when none was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Rate limit headers seen on the failing response, if any.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        self.rate_limit_info.as_ref()
    }

    /// The server-requested wait from `Retry-After`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.rate_limit_info()?.retry_after
    }

    /// Returns `true` if the failure may be transient.
    ///
    /// 4xx responses other than 429 are never retryable, whatever their kind.
    pub fn is_retryable(&self) -> bool {
        if (400..500).contains(&self.status) && self.status != 429 {
            return false;
        }
        self.kind.is_transient()
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        ApiError::configuration(format!("Invalid URL: {}", error))
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(StatusCode::BAD_REQUEST), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(StatusCode::SERVICE_UNAVAILABLE), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(StatusCode::NOT_MODIFIED), ErrorKind::Unexpected);
    }

    #[test]
    fn test_http_error_without_body_code() {
        let err = ApiError::from_http(
            StatusCode::SERVICE_UNAVAILABLE,
            "http://localhost/items",
            "upstream down",
            &HeaderMap::new(),
        );

        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.code(), Some("HTTP_503"));
        assert_eq!(err.message(), "HTTP error 503 Service Unavailable");
        assert_eq!(err.path(), Some("http://localhost/items"));
        assert_eq!(err.details(), Some(&json!("upstream down")));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_http_error_takes_error_field_as_message() {
        let err = ApiError::from_http(
            StatusCode::CONFLICT,
            "http://localhost/items",
            r#"{"error":"duplicate name"}"#,
            &HeaderMap::new(),
        );

        assert_eq!(err.message(), "duplicate name");
        assert_eq!(err.details(), Some(&json!({"error": "duplicate name"})));
    }

    #[test]
    fn test_rate_limited_error_keeps_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));

        let err = ApiError::from_http(StatusCode::TOO_MANY_REQUESTS, "/x", "", &headers);

        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(err.details(), None);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_window_headers_are_kept_without_active_limit() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("17"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let err = ApiError::from_http(StatusCode::SERVICE_UNAVAILABLE, "/x", "", &headers);

        let info = err.rate_limit_info().expect("window headers should be kept");
        assert_eq!(info.remaining, Some(17));
        assert!(info.reset_at.is_some());
        assert_eq!(err.retry_after(), None);

        let plain = ApiError::from_http(StatusCode::SERVICE_UNAVAILABLE, "/x", "", &HeaderMap::new());
        assert!(plain.rate_limit_info().is_none());
    }

    #[test]
    fn test_huge_reset_header_does_not_panic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("18446744073709551615"),
        );

        let err = ApiError::from_http(StatusCode::SERVICE_UNAVAILABLE, "/x", "", &headers);

        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(err.rate_limit_info().is_none());
    }

    #[test]
    fn test_non_transient_kinds() {
        assert!(!ApiError::configuration("missing endpoint").is_retryable());
        assert!(!ApiError::validation("page must be >= 1").is_retryable());
        assert!(!ApiError::unexpected("boom").is_retryable());
        assert!(ApiError::timeout("/x", Duration::from_millis(10)).is_retryable());
        assert!(ApiError::network("/x", "NETWORK_ERROR", "refused").is_retryable());
    }

    #[test]
    fn test_connectivity_message_preserves_original() {
        let err = ApiError::network("/x", "NETWORK_ERROR", "connection refused")
            .with_connectivity_message();

        assert_eq!(err.message(), NETWORK_ERROR_MESSAGE);
        assert_eq!(err.details(), Some(&json!("connection refused")));
        assert_eq!(err.status(), 0);

        let with_details = ApiError::network("/x", "NETWORK_ERROR", "reset")
            .with_details(json!({"errno": 104}))
            .with_connectivity_message();
        assert_eq!(with_details.details(), Some(&json!({"errno": 104})));
    }

    #[test]
    fn test_serializes_as_plain_value() {
        let err = ApiError::from_http(
            StatusCode::UNPROCESSABLE_ENTITY,
            "http://localhost/items",
            r#"{"message":"name is required","code":"INVALID"}"#,
            &HeaderMap::new(),
        );

        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "client");
        assert_eq!(value["status"], 422);
        assert_eq!(value["code"], "INVALID");
        assert_eq!(value["path"], "http://localhost/items");

        let back: ApiError = serde_json::from_value(value).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_display() {
        let err = ApiError::validation("limit must be >= 1");
        assert_eq!(err.to_string(), "limit must be >= 1 (status 400)");
    }
}
