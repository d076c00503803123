//! Rate limit header parsing.
//!
//! A `429` response may tell the client how long to back off. The retry policy
//! honors `Retry-After`; the window headers are kept on the error for
//! diagnostics.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RETRY_AFTER: &str = "retry-after";
const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];
const REMAINING: &str = "x-ratelimit-remaining";

/// Throttling hints a server attached to a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Server-requested pause before the next attempt.
    pub retry_after: Option<Duration>,

    /// Moment the current quota window ends.
    pub reset_at: Option<SystemTime>,

    /// Requests left in the current window.
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Reads `Retry-After`, the reset timestamp, and the remaining quota.
    ///
    /// Unparseable or out-of-range values are ignored field by field.
    ///
    /// # Examples
    ///
    /// ```
    /// use apiary::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "3".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(3)));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: parse_retry_after(headers),
            reset_at: parse_rate_limit_reset(headers),
            remaining: parse_rate_limit_remaining(headers),
        }
    }

    /// Whether the server asked for a pause or reported an exhausted quota.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }

    /// Whether no header was recognized.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// `Retry-After` is either a number of seconds or an HTTP date. Dates already
/// in the past mean no wait.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = header_str(headers, RETRY_AFTER)?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => httpdate::parse_http_date(raw)
            .ok()
            .and_then(|at| at.duration_since(SystemTime::now()).ok()),
    }
}

/// First reset header holding a Unix timestamp that fits in a `SystemTime`.
fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<SystemTime> {
    RESET_HEADERS.iter().find_map(|name| {
        let secs = header_str(headers, name)?.parse::<u64>().ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs))
    })
}

fn parse_rate_limit_remaining(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, REMAINING).and_then(|raw| raw.parse().ok())
}
