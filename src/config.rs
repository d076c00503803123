//! Process-wide API configuration.
//!
//! An [`ApiConfig`] names every endpoint the application talks to. It is built
//! once at startup and only read afterwards; a [`Client`](crate::Client) holds
//! it behind an `Arc`.

use crate::{ApiError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Settings for one logical endpoint.
///
/// # Examples
///
/// ```
/// use apiary::EndpointConfig;
/// use std::time::Duration;
///
/// let items = EndpointConfig::new("inventory/items")
///     .timeout(Duration::from_secs(2))
///     .retries(3);
///
/// assert_eq!(items.path(), "inventory/items");
/// assert_eq!(items.retry_count(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    path: String,
    #[serde(default, with = "millis")]
    timeout: Option<Duration>,
    #[serde(default)]
    retries: Option<u32>,
}

impl EndpointConfig {
    /// Creates an endpoint at `path` relative to the base URL.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            timeout: None,
            retries: None,
        }
    }

    /// Sets the per-attempt timeout for this endpoint.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how many times idempotent calls to this endpoint are retried.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn timeout_value(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry_count(&self) -> Option<u32> {
        self.retries
    }
}

/// The full client configuration.
///
/// Deserializes from the camelCase shape
/// `{ "baseUrl", "endpoints", "defaultTimeout", "defaultRetries" }` with
/// durations given in milliseconds.
///
/// # Examples
///
/// ```
/// use apiary::{ApiConfig, EndpointConfig};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), apiary::ApiError> {
/// let config = ApiConfig::builder()
///     .base_url("https://api.example.com/v1")?
///     .endpoint("items", EndpointConfig::new("items").retries(2))
///     .default_timeout(Duration::from_secs(10))
///     .build()?;
///
/// assert!(config.endpoint("items").is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawApiConfig")]
pub struct ApiConfig {
    base_url: Url,
    endpoints: HashMap<String, EndpointConfig>,
    default_timeout: Option<Duration>,
    default_retries: Option<u32>,
}

impl ApiConfig {
    /// Creates a new `ApiConfigBuilder`.
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ApiError::configuration(format!("Invalid API configuration: {}", e)))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Looks up a registered endpoint by name.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.get(name)
    }

    pub fn endpoints(&self) -> &HashMap<String, EndpointConfig> {
        &self.endpoints
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn default_retries(&self) -> Option<u32> {
        self.default_retries
    }
}

/// Builder for [`ApiConfig`].
#[derive(Default)]
pub struct ApiConfigBuilder {
    base_url: Option<Url>,
    endpoints: HashMap<String, EndpointConfig>,
    default_timeout: Option<Duration>,
    default_retries: Option<u32>,
}

impl ApiConfigBuilder {
    /// Sets the base URL every endpoint path is appended to.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Registers an endpoint under `name`, replacing any earlier registration.
    pub fn endpoint(mut self, name: impl Into<String>, endpoint: EndpointConfig) -> Self {
        self.endpoints.insert(name.into(), endpoint);
        self
    }

    /// Sets the timeout used by endpoints that do not specify their own.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the retry count used by endpoints that do not specify their own.
    pub fn default_retries(mut self, retries: u32) -> Self {
        self.default_retries = Some(retries);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no base URL was provided or if it
    /// cannot carry path segments (e.g. `mailto:`).
    pub fn build(self) -> Result<ApiConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| ApiError::configuration("Base URL is required"))?;

        validate_base_url(&base_url)?;

        Ok(ApiConfig {
            base_url,
            endpoints: self.endpoints,
            default_timeout: self.default_timeout,
            default_retries: self.default_retries,
        })
    }
}

fn validate_base_url(url: &Url) -> Result<()> {
    if url.cannot_be_a_base() {
        return Err(ApiError::configuration(format!(
            "Base URL {} cannot carry endpoint paths",
            url
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawApiConfig {
    base_url: Url,
    endpoints: HashMap<String, EndpointConfig>,
    #[serde(default, with = "millis")]
    default_timeout: Option<Duration>,
    #[serde(default)]
    default_retries: Option<u32>,
}

impl TryFrom<RawApiConfig> for ApiConfig {
    type Error = ApiError;

    fn try_from(raw: RawApiConfig) -> Result<Self> {
        validate_base_url(&raw.base_url)?;
        Ok(ApiConfig {
            base_url: raw.base_url,
            endpoints: raw.endpoints,
            default_timeout: raw.default_timeout,
            default_retries: raw.default_retries,
        })
    }
}

/// `Option<Duration>` as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
