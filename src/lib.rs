//! # Apiary - a configuration-driven HTTP resource client
//!
//! Apiary turns a declarative map of named endpoints into uniform, typed CRUD
//! and search operations. Every call runs through one pipeline that handles
//! authentication headers, per-endpoint timeouts, retries with exponential
//! backoff, `Retry-After` on rate limits, and error normalization.
//!
//! ## Quick Start
//!
//! ```no_run
//! use apiary::{ApiConfig, Client, EndpointConfig, SearchParameters, SortDirection};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Item {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[derive(Serialize)]
//! struct NewItem {
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), apiary::ApiError> {
//!     let config = ApiConfig::builder()
//!         .base_url("https://api.example.com/v1")?
//!         .endpoint(
//!             "items",
//!             EndpointConfig::new("inventory/items")
//!                 .timeout(Duration::from_secs(3))
//!                 .retries(2),
//!         )
//!         .build()?;
//!
//!     let client = Client::builder().config(config).build()?;
//!     let items = client.resource::<Item>("items")?;
//!
//!     // GET /v1/inventory/items?search=bolt&sort=...&page=1&limit=10
//!     let params = SearchParameters::new()
//!         .search("bolt")
//!         .sort("name", SortDirection::Asc)
//!         .limit(10);
//!     let page = items.search(Some(&params)).await?;
//!     println!("page 1 of {}", page.pagination.pages);
//!
//!     // POST /v1/inventory/items (never retried unless asked for)
//!     let created = items.create(&NewItem { name: "hex bolt".into() }).await?;
//!     println!("created {} ({})", created.data.id, created.data.name);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every failure is an [`ApiError`] with an [`ErrorKind`], an HTTP status
//! (`0` when none was received), and an optional code, path, and details:
//!
//! ```no_run
//! use apiary::{ErrorKind, ResourceClient};
//!
//! # async fn example(items: ResourceClient<serde_json::Value>) {
//! match items.read(42).await {
//!     Ok(item) => println!("{:?}", item.data),
//!     Err(e) if e.kind() == ErrorKind::Client && e.status() == 404 => println!("gone"),
//!     Err(e) if e.kind() == ErrorKind::Network => eprintln!("{}", e.message()),
//!     Err(e) => eprintln!("{} {:?}: {:?}", e.status(), e.code(), e.details()),
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! Idempotent calls (`search`, `read`, `remove`) are retried up to the
//! endpoint's retry count. Client errors (4xx other than 429) fail at once;
//! 429 honors `Retry-After`; everything else backs off `1s, 2s, 4s, ...` up to
//! [`MAX_RETRY_DELAY`](retry::MAX_RETRY_DELAY). `create` and `update` are sent
//! once unless [`ResourceClient::with_retries`] opts them in.

mod client;
pub mod config;
pub mod credentials;
pub mod endpoint;
mod error;
pub mod metadata;
pub mod params;
pub mod rate_limit;
mod resource;
pub mod response;
pub mod retry;

pub use client::{Client, ClientBuilder};
pub use config::{ApiConfig, EndpointConfig};
pub use credentials::{CredentialStore, MemoryCredentialStore};
pub use endpoint::{EndpointRegistry, ResolvedEndpoint};
pub use error::{ApiError, ErrorKind, Result, NETWORK_ERROR_MESSAGE};
pub use params::{build_query, SearchParameters, SortDirection, SortField};
pub use resource::ResourceClient;
pub use response::{ApiResponse, ApiSearchResponse, Pagination};
pub use retry::{RetryDecision, RetryPolicy};
