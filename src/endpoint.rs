//! Endpoint resolution.
//!
//! The [`EndpointRegistry`] turns a logical endpoint name into the path,
//! timeout, and retry count a request should use, falling back to the global
//! defaults of the [`ApiConfig`].

use crate::{ApiConfig, ApiError, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Timeout used when neither the endpoint nor the config sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Retry count used when neither the endpoint nor the config sets one.
pub const DEFAULT_RETRIES: u32 = 0;

/// An endpoint with every fallback applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    /// The logical name the endpoint was registered under.
    pub name: String,
    /// Path relative to the base URL.
    pub path: String,
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Retries allowed for idempotent operations.
    pub retries: u32,
}

/// Read-only view over the configured endpoints.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    config: Arc<ApiConfig>,
}

impl EndpointRegistry {
    pub fn new(config: Arc<ApiConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Resolves `name` to its effective settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no endpoint is registered under `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use apiary::{ApiConfig, EndpointConfig, EndpointRegistry, ErrorKind};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// # fn main() -> Result<(), apiary::ApiError> {
    /// let config = ApiConfig::builder()
    ///     .base_url("https://api.example.com")?
    ///     .endpoint("items", EndpointConfig::new("items").retries(2))
    ///     .build()?;
    /// let registry = EndpointRegistry::new(Arc::new(config));
    ///
    /// let items = registry.resolve("items")?;
    /// assert_eq!(items.timeout, Duration::from_millis(5_000));
    /// assert_eq!(items.retries, 2);
    ///
    /// let missing = registry.resolve("orders").unwrap_err();
    /// assert_eq!(missing.kind(), ErrorKind::Configuration);
    /// # Ok(())
    /// # }
    /// ```
    pub fn resolve(&self, name: &str) -> Result<ResolvedEndpoint> {
        let endpoint = self.config.endpoint(name).ok_or_else(|| {
            ApiError::configuration(format!("Endpoint '{}' is not configured", name))
        })?;

        Ok(ResolvedEndpoint {
            name: name.to_string(),
            path: endpoint.path().to_string(),
            timeout: endpoint
                .timeout_value()
                .or(self.config.default_timeout())
                .unwrap_or(DEFAULT_TIMEOUT),
            retries: endpoint
                .retry_count()
                .or(self.config.default_retries())
                .unwrap_or(DEFAULT_RETRIES),
        })
    }

    /// Builds `{base_url}/{endpoint.path}[/{id}][?query]`.
    ///
    /// Path segments and query values are percent-encoded; the id is always a
    /// single segment.
    pub fn url_for(
        &self,
        endpoint: &ResolvedEndpoint,
        id: Option<&str>,
        query: &[(String, String)],
    ) -> Result<Url> {
        let mut url = self.config.base_url().clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ApiError::configuration(format!(
                    "Base URL {} cannot carry endpoint paths",
                    self.config.base_url()
                ))
            })?;
            segments.pop_if_empty();
            segments.extend(endpoint.path.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndpointConfig, ErrorKind};

    fn registry(base: &str) -> EndpointRegistry {
        let config = ApiConfig::builder()
            .base_url(base)
            .unwrap()
            .endpoint(
                "items",
                EndpointConfig::new("/inventory/items/")
                    .timeout(Duration::from_millis(750))
                    .retries(4),
            )
            .endpoint("users", EndpointConfig::new("users"))
            .build()
            .unwrap();
        EndpointRegistry::new(Arc::new(config))
    }

    #[test]
    fn test_resolve_endpoint_settings_win() {
        let items = registry("https://api.example.com").resolve("items").unwrap();

        assert_eq!(items.name, "items");
        assert_eq!(items.timeout, Duration::from_millis(750));
        assert_eq!(items.retries, 4);
    }

    #[test]
    fn test_resolve_falls_back_to_config_defaults() {
        let config = ApiConfig::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .endpoint("users", EndpointConfig::new("users"))
            .default_timeout(Duration::from_secs(9))
            .default_retries(1)
            .build()
            .unwrap();
        let users = EndpointRegistry::new(Arc::new(config))
            .resolve("users")
            .unwrap();

        assert_eq!(users.timeout, Duration::from_secs(9));
        assert_eq!(users.retries, 1);
    }

    #[test]
    fn test_resolve_falls_back_to_builtin_defaults() {
        let users = registry("https://api.example.com").resolve("users").unwrap();

        assert_eq!(users.timeout, DEFAULT_TIMEOUT);
        assert_eq!(users.retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_resolve_unknown_endpoint() {
        let err = registry("https://api.example.com").resolve("orders").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.code(), Some("CONFIGURATION_ERROR"));
        assert!(err.message().contains("orders"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_url_for_collection_and_item() {
        let registry = registry("https://api.example.com/v1/");
        let items = registry.resolve("items").unwrap();

        assert_eq!(
            registry.url_for(&items, None, &[]).unwrap().as_str(),
            "https://api.example.com/v1/inventory/items"
        );
        assert_eq!(
            registry.url_for(&items, Some("a b/c"), &[]).unwrap().as_str(),
            "https://api.example.com/v1/inventory/items/a%20b%2Fc"
        );
    }

    #[test]
    fn test_url_for_appends_query_in_order() {
        let registry = registry("https://api.example.com");
        let users = registry.resolve("users").unwrap();
        let query = vec![
            ("search".to_string(), "ada lovelace".to_string()),
            ("page".to_string(), "1".to_string()),
            ("limit".to_string(), "100".to_string()),
        ];

        assert_eq!(
            registry.url_for(&users, None, &query).unwrap().as_str(),
            "https://api.example.com/users?search=ada+lovelace&page=1&limit=100"
        );
    }
}
