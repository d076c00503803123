//! The request pipeline.
//!
//! Every outbound call goes through [`Client::dispatch`], which resolves the
//! endpoint, injects the standard and authorization headers, runs the attempt
//! loop under the per-attempt timeout and the [`RetryPolicy`], normalizes the
//! body into an envelope, and normalizes failures into [`ApiError`] after
//! applying status side effects.

use crate::{
    credentials::{CredentialStore, MemoryCredentialStore},
    endpoint::EndpointRegistry,
    metadata::{Operation, Overrides, RequestMetadata},
    resource::ResourceClient,
    response,
    retry::{RetryDecision, RetryPolicy},
    ApiConfig, ApiError, ErrorKind, Result,
};
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, StatusCode,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A configuration-driven HTTP client.
///
/// The client is cheap to clone and meant to be shared; all clones use the same
/// connection pool, configuration, and credential store.
///
/// # Examples
///
/// ```no_run
/// use apiary::{ApiConfig, Client, EndpointConfig, SearchParameters};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), apiary::ApiError> {
/// let config = ApiConfig::builder()
///     .base_url("https://api.example.com")?
///     .endpoint("items", EndpointConfig::new("items").retries(2))
///     .build()?;
///
/// let client = Client::builder().config(config).build()?;
/// let items = client.resource::<Item>("items")?;
///
/// let page = items.search(Some(&SearchParameters::new().limit(20))).await?;
/// println!("{} of {} items", page.data.len(), page.pagination.total);
///
/// let item = items.read(7).await?;
/// println!("Item {}: {}", item.data.id, item.data.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    registry: EndpointRegistry,
    default_headers: HeaderMap,
    credentials: Arc<dyn CredentialStore>,
    retry_policy: RetryPolicy,
}

impl Client {
    /// Creates a new `ClientBuilder`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The endpoint registry backing this client.
    pub fn registry(&self) -> &EndpointRegistry {
        &self.inner.registry
    }

    /// Returns a [`ResourceClient`] bound to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `endpoint` is not configured.
    pub fn resource<T>(&self, endpoint: &str) -> Result<ResourceClient<T>> {
        ResourceClient::new(self.clone(), endpoint)
    }

    /// Sends one logical call through the pipeline and returns the normalized
    /// envelope as JSON.
    ///
    /// The endpoint is resolved before anything touches the network, so an
    /// unknown name fails with a configuration error and no request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use apiary::metadata::{Operation, RequestMetadata};
    /// use apiary::Client;
    ///
    /// # async fn example(client: Client) -> Result<(), apiary::ApiError> {
    /// let metadata = RequestMetadata::new(Operation::Read, "items").with_id("7");
    /// let envelope = client.dispatch::<()>(metadata, None).await?;
    /// println!("status {}", envelope["metadata"]["statusCode"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn dispatch<B>(&self, metadata: RequestMetadata, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let endpoint = self.inner.registry.resolve(&metadata.endpoint)?;

        let mut headers = metadata.headers.clone();
        let overrides = Overrides::take_from(&mut headers)?;
        let timeout = overrides.timeout.unwrap_or(endpoint.timeout);
        let max_retries = overrides.retries.unwrap_or(if metadata.operation.is_idempotent() {
            endpoint.retries
        } else {
            0
        });

        let url = self
            .inner
            .registry
            .url_for(&endpoint, metadata.id.as_deref(), &metadata.query)?;

        let payload = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::validation(format!("Failed to serialize request: {}", e)))?;

        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            let result = self
                .execute_attempt(&metadata, &url, &headers, payload.as_ref(), timeout, attempt)
                .await;

            match result {
                Ok((status, body)) => {
                    tracing::info!(
                        endpoint = %endpoint.name,
                        status = status.as_u16(),
                        latency_ms = start_time.elapsed().as_millis(),
                        attempts = attempt + 1,
                        "Request succeeded"
                    );
                    return Ok(match metadata.operation {
                        Operation::Search { page, limit } => {
                            response::wrap_search(body, status, page, limit)
                        }
                        _ => response::wrap(body, status),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        method = %metadata.operation.method(),
                        url = %url,
                        "Request failed"
                    );

                    match self.inner.retry_policy.decide(attempt, max_retries, &e) {
                        RetryDecision::Retry { delay } => {
                            tracing::info!(
                                delay_ms = delay.as_millis(),
                                attempt = attempt,
                                max_retries = max_retries,
                                "Retrying request after delay"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::GiveUp => return Err(self.apply_side_effects(e)),
                    }
                }
            }
        }
    }

    /// Executes a single attempt bounded by `timeout`.
    ///
    /// On timeout the in-flight exchange is dropped, which aborts it.
    async fn execute_attempt(
        &self,
        metadata: &RequestMetadata,
        url: &Url,
        headers: &HeaderMap,
        payload: Option<&Value>,
        timeout: Duration,
        attempt: usize,
    ) -> Result<(StatusCode, Value)> {
        let method = metadata.operation.method();

        tracing::debug!(
            method = %method,
            url = %url,
            attempt = attempt,
            timeout_ms = timeout.as_millis(),
            "Executing HTTP request"
        );

        let mut request = self
            .inner
            .http_client
            .request(method, url.clone())
            .headers(self.request_headers(headers));

        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| ApiError::from_transport(e, url.as_str()))?;

            let status = response.status();
            let response_headers = response.headers().clone();
            let raw_body = response
                .text()
                .await
                .map_err(|e| ApiError::from_transport(e, url.as_str()))?;

            if !status.is_success() {
                let error = ApiError::from_http(status, url.as_str(), &raw_body, &response_headers);
                if error.kind() == ErrorKind::Client {
                    tracing::error!(status = status.as_u16(), response = %raw_body, "Client error (4xx)");
                }
                return Err(error);
            }

            Ok((status, parse_body(status, url, &raw_body)?))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(url.as_str(), timeout)),
        }
    }

    /// Standard headers, then client defaults, then per-request headers, then
    /// the bearer token if one is stored.
    fn request_headers(&self, request_headers: &HeaderMap) -> HeaderMap {
        let json = HeaderValue::from_static("application/json");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, json.clone());
        headers.insert(ACCEPT, json);

        for (name, value) in self
            .inner
            .default_headers
            .iter()
            .chain(request_headers.iter())
        {
            headers.insert(name.clone(), value.clone());
        }

        // The token may have been cleared since the last attempt; sending
        // without it is fine.
        if let Some(token) = self.inner.credentials.get() {
            match HeaderValue::try_from(format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Stored credential is not a valid header value; skipping"),
            }
        }

        headers
    }

    /// Runs status side effects on a terminal error and returns it.
    fn apply_side_effects(&self, error: ApiError) -> ApiError {
        match error.status() {
            401 => {
                tracing::warn!(path = ?error.path(), "Unauthorized - clearing stored credential");
                self.inner.credentials.clear();
                error
            }
            403 => {
                tracing::warn!(path = ?error.path(), "Forbidden - credential lacks permission");
                error
            }
            _ if error.kind() == ErrorKind::Network => error.with_connectivity_message(),
            _ => error,
        }
    }
}

fn parse_body(status: StatusCode, url: &Url, raw_body: &str) -> Result<Value> {
    if raw_body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(raw_body).map_err(|e| {
        tracing::error!(error = %e, raw_response = %raw_body, "Failed to parse response body");
        ApiError::unexpected(format!(
            "Failed to parse response body (status {}): {}",
            status.as_u16(),
            e
        ))
        .with_path(url.as_str())
        .with_details(Value::String(raw_body.to_string()))
    })
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use apiary::{ApiConfig, Client, MemoryCredentialStore, RetryPolicy};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example(config: ApiConfig) -> Result<(), apiary::ApiError> {
/// let credentials = Arc::new(MemoryCredentialStore::with_token("secret"));
///
/// let client = Client::builder()
///     .config(config)
///     .credential_store(credentials.clone())
///     .retry_policy(RetryPolicy {
///         base_delay: Duration::from_millis(250),
///         ..RetryPolicy::default()
///     })
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: Option<ApiConfig>,
    default_headers: HeaderMap,
    credentials: Option<Arc<dyn CredentialStore>>,
    retry_policy: RetryPolicy,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            config: None,
            default_headers: HeaderMap::new(),
            credentials: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Sets the endpoint configuration. Required.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ApiError::configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ApiError::configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets where the bearer token is read from.
    ///
    /// Defaults to an empty [`MemoryCredentialStore`].
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Sets the backoff policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration was provided or the HTTP client
    /// cannot be created.
    pub fn build(self) -> Result<Client> {
        let config = self
            .config
            .ok_or_else(|| ApiError::configuration("API configuration is required"))?;

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            ApiError::configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                registry: EndpointRegistry::new(Arc::new(config)),
                default_headers: self.default_headers,
                credentials,
                retry_policy: self.retry_policy,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
