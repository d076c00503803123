//! A typed client bound to one endpoint.

use crate::{
    metadata::{Operation, RequestMetadata},
    params::build_query,
    response::{ApiResponse, ApiSearchResponse},
    ApiError, Client, Result, SearchParameters,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// CRUD and search operations on a single configured endpoint.
///
/// `T` is the resource type; `G` is the type of search result groups.
///
/// `search`, `read`, and `remove` are retried according to the endpoint's
/// retry count. `create` and `update` are sent once unless a retry count is
/// set explicitly with [`with_retries`](Self::with_retries).
///
/// # Examples
///
/// ```no_run
/// use apiary::{Client, ResourceClient, SearchParameters, SortDirection};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// #[derive(Serialize)]
/// struct NewItem<'a> {
///     name: &'a str,
/// }
///
/// # async fn example(client: Client) -> Result<(), apiary::ApiError> {
/// let items: ResourceClient<Item> = client.resource("items")?;
///
/// let created = items.create(&NewItem { name: "bolt" }).await?;
/// let renamed = items.update(created.data.id, &NewItem { name: "nut" }).await?;
/// assert_eq!(renamed.data.name, "nut");
///
/// let params = SearchParameters::new().search("nut").sort("name", SortDirection::Asc);
/// let page = items.search(Some(&params)).await?;
/// println!("{} pages", page.pagination.pages);
///
/// items.remove(created.data.id).await?;
/// # Ok(())
/// # }
/// ```
pub struct ResourceClient<T, G = Value> {
    client: Client,
    endpoint: String,
    timeout: Option<Duration>,
    retries: Option<u32>,
    _marker: PhantomData<fn() -> (T, G)>,
}

impl<T, G> Clone for ResourceClient<T, G> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
            retries: self.retries,
            _marker: PhantomData,
        }
    }
}

impl<T, G> fmt::Debug for ResourceClient<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

impl<T, G> ResourceClient<T, G> {
    /// Binds `client` to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `endpoint` is not configured.
    pub fn new(client: Client, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        client.registry().resolve(&endpoint)?;

        Ok(Self {
            client,
            endpoint,
            timeout: None,
            retries: None,
            _marker: PhantomData,
        })
    }

    /// The endpoint name this client is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Overrides the per-attempt timeout for calls made through this handle.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the retry count for calls made through this handle.
    ///
    /// This also opts `create` and `update` into retrying.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    fn metadata(&self, operation: Operation) -> RequestMetadata {
        let mut metadata = RequestMetadata::new(operation, self.endpoint.clone());
        if let Some(timeout) = self.timeout {
            metadata = metadata.with_timeout_override(timeout);
        }
        if let Some(retries) = self.retries {
            metadata = metadata.with_retries_override(retries);
        }
        metadata
    }

    fn item_metadata(&self, operation: Operation, id: impl fmt::Display) -> Result<RequestMetadata> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(ApiError::validation("Resource id must not be empty"));
        }
        Ok(self.metadata(operation).with_id(id))
    }
}

impl<T, G> ResourceClient<T, G>
where
    T: DeserializeOwned,
    G: DeserializeOwned,
{
    /// Searches the collection. `GET {path}?query`.
    pub async fn search(&self, params: Option<&SearchParameters>) -> Result<ApiSearchResponse<T, G>> {
        let query = build_query(params)?;
        let operation = Operation::Search {
            page: params.map_or(crate::params::DEFAULT_PAGE, SearchParameters::resolved_page),
            limit: params.map_or(crate::params::DEFAULT_LIMIT, SearchParameters::resolved_limit),
        };

        let metadata = self.metadata(operation).with_query_params(query);
        let envelope = self.client.dispatch::<()>(metadata, None).await?;
        ApiSearchResponse::from_envelope(envelope)
    }

    /// Fetches one resource. `GET {path}/{id}`.
    pub async fn read(&self, id: impl fmt::Display) -> Result<ApiResponse<T>> {
        let metadata = self.item_metadata(Operation::Read, id)?;
        let envelope = self.client.dispatch::<()>(metadata, None).await?;
        ApiResponse::from_envelope(envelope)
    }

    /// Creates a resource. `POST {path}`.
    pub async fn create<B>(&self, data: &B) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
    {
        let metadata = self.metadata(Operation::Create);
        let envelope = self.client.dispatch(metadata, Some(data)).await?;
        ApiResponse::from_envelope(envelope)
    }

    /// Partially updates a resource. `PATCH {path}/{id}`.
    pub async fn update<B>(&self, id: impl fmt::Display, data: &B) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
    {
        let metadata = self.item_metadata(Operation::Update, id)?;
        let envelope = self.client.dispatch(metadata, Some(data)).await?;
        ApiResponse::from_envelope(envelope)
    }

    /// Deletes a resource. `DELETE {path}/{id}`.
    ///
    /// Servers often answer with an empty body, in which case `data` is `None`.
    pub async fn remove(&self, id: impl fmt::Display) -> Result<ApiResponse<Option<T>>> {
        let metadata = self.item_metadata(Operation::Remove, id)?;
        let envelope = self.client.dispatch::<()>(metadata, None).await?;
        ApiResponse::from_envelope(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApiConfig, EndpointConfig, ErrorKind};

    fn client() -> Client {
        let config = ApiConfig::builder()
            .base_url("http://127.0.0.1:9")
            .unwrap()
            .endpoint("items", EndpointConfig::new("items"))
            .build()
            .unwrap();
        Client::builder().config(config).build().unwrap()
    }

    #[test]
    fn test_unknown_endpoint_fails_at_bind_time() {
        let err = client().resource::<Value>("orders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_overrides_become_headers() {
        let items = client()
            .resource::<Value>("items")
            .unwrap()
            .with_timeout(Duration::from_millis(250))
            .with_retries(2);

        let metadata = items.metadata(Operation::Create);
        assert_eq!(
            metadata.headers[crate::metadata::TIMEOUT_OVERRIDE_HEADER],
            "250"
        );
        assert_eq!(metadata.headers[crate::metadata::RETRIES_OVERRIDE_HEADER], "2");
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected_before_sending() {
        let items = client().resource::<Value>("items").unwrap();

        let err = items.read("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
