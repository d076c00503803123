//! The retry and backoff policy applied to every failed attempt.
//!
//! After each failure the pipeline asks [`RetryPolicy::decide`] whether to try
//! again and how long to wait first:
//!
//! - client errors (4xx other than 429) and non-transient kinds give up at once
//! - attempts are capped at `retries + 1`
//! - a 429 carrying `Retry-After` waits that long, capped at `max_delay`
//! - everything else backs off exponentially: `base_delay * 2^attempt`, capped at `max_delay`

use crate::ApiError;
use rand::Rng;
use std::time::Duration;

/// Base delay of the exponential backoff.
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound on any single wait between attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(10_000);

/// The outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after waiting `delay`.
    Retry { delay: Duration },
    /// Surface the error to the caller.
    GiveUp,
}

/// Backoff configuration.
///
/// # Examples
///
/// ```
/// use apiary::{ApiError, RetryDecision, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// let err = ApiError::timeout("https://api.example.com/items", Duration::from_secs(5));
///
/// // Second attempt (attempt index 1) with three retries allowed.
/// assert_eq!(
///     policy.decide(1, 3, &err),
///     RetryDecision::Retry { delay: Duration::from_millis(2_000) }
/// );
/// assert_eq!(policy.decide(3, 3, &err), RetryDecision::GiveUp);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry; doubled for each further attempt.
    pub base_delay: Duration,
    /// Ceiling for both backoff and `Retry-After` waits.
    pub max_delay: Duration,
    /// Scale backoff delays by a random factor in `[0.5, 1.0]`.
    ///
    /// Never applied to `Retry-After` waits.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: BASE_RETRY_DELAY,
            max_delay: MAX_RETRY_DELAY,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Decides what to do after attempt number `attempt` (0-based) failed with `error`.
    ///
    /// `max_retries` is the effective retry count for the call; a call makes at
    /// most `max_retries + 1` attempts.
    pub fn decide(&self, attempt: usize, max_retries: u32, error: &ApiError) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::GiveUp;
        }

        if attempt >= max_retries as usize {
            return RetryDecision::GiveUp;
        }

        if error.status() == 429 {
            if let Some(retry_after) = error.retry_after() {
                return RetryDecision::Retry {
                    delay: retry_after.min(self.max_delay),
                };
            }
        }

        RetryDecision::Retry {
            delay: self.backoff_delay(attempt),
        }
    }

    /// Returns the exponential backoff delay after attempt `attempt` (0-based).
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.min(u32::MAX as usize) as u32);
        let delay = self.base_delay.saturating_mul(multiplier).min(self.max_delay);

        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use http::{HeaderMap, HeaderValue, StatusCode};

    fn http_error(status: StatusCode, retry_after: Option<&'static str>) -> ApiError {
        let mut headers = HeaderMap::new();
        if let Some(value) = retry_after {
            headers.insert("retry-after", HeaderValue::from_static(value));
        }
        ApiError::from_http(status, "http://localhost/items", "", &headers)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (0..6).map(|a| policy.backoff_delay(a).as_millis()).collect();

        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 10_000, 10_000]);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(200), MAX_RETRY_DELAY);
    }

    #[test]
    fn test_consecutive_503_delays_non_decreasing() {
        let policy = RetryPolicy::default();
        let err = http_error(StatusCode::SERVICE_UNAVAILABLE, None);

        let mut previous = Duration::ZERO;
        for attempt in 0..8 {
            match policy.decide(attempt, 8, &err) {
                RetryDecision::Retry { delay } => {
                    assert!(delay >= previous);
                    assert!(delay <= MAX_RETRY_DELAY);
                    previous = delay;
                }
                RetryDecision::GiveUp => panic!("503 should be retried at attempt {}", attempt),
            }
        }
        assert_eq!(policy.decide(8, 8, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retry_after_is_honored() {
        let policy = RetryPolicy::default();
        let err = http_error(StatusCode::TOO_MANY_REQUESTS, Some("3"));

        assert_eq!(
            policy.decide(0, 2, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::default();
        let err = http_error(StatusCode::TOO_MANY_REQUESTS, Some("600"));

        assert_eq!(
            policy.decide(0, 2, &err),
            RetryDecision::Retry {
                delay: MAX_RETRY_DELAY
            }
        );
    }

    #[test]
    fn test_rate_limited_without_retry_after_backs_off() {
        let policy = RetryPolicy::default();
        let err = http_error(StatusCode::TOO_MANY_REQUESTS, None);

        assert_eq!(
            policy.decide(2, 5, &err),
            RetryDecision::Retry {
                delay: Duration::from_millis(4_000)
            }
        );
    }

    #[test]
    fn test_client_errors_give_up_immediately() {
        let policy = RetryPolicy::default();
        for status in [400, 401, 403, 404, 409, 422] {
            let err = http_error(StatusCode::from_u16(status).unwrap(), None);
            assert_eq!(policy.decide(0, 10, &err), RetryDecision::GiveUp, "status {}", status);
        }
    }

    #[test]
    fn test_zero_retries_gives_up() {
        let policy = RetryPolicy::default();
        let err = ApiError::new(ErrorKind::Network, 0, "connection refused");

        assert_eq!(policy.decide(0, 0, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };

        for _ in 0..50 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_millis(1_000) && delay <= Duration::from_millis(2_000));
        }
    }

    #[test]
    fn test_jitter_never_shortens_retry_after() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };
        let err = http_error(StatusCode::TOO_MANY_REQUESTS, Some("3"));

        assert_eq!(
            policy.decide(0, 1, &err),
            RetryDecision::Retry {
                delay: Duration::from_secs(3)
            }
        );
    }
}
