//! Search parameters and their query-string encoding.
//!
//! [`build_query`] is a pure function: it turns [`SearchParameters`] into an
//! ordered list of query pairs. `filter` and `sort` are JSON-encoded so they
//! survive the trip through a query string unchanged.

use crate::{ApiError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page used when none is given.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when none is given.
pub const DEFAULT_LIMIT: u32 = 100;

/// Sort order of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One entry of a multi-column sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

/// Structured search, filter, sort, pagination, and grouping options.
///
/// # Examples
///
/// ```
/// use apiary::{SearchParameters, SortDirection};
///
/// let params = SearchParameters::new()
///     .page(2)
///     .limit(25)
///     .search("widget")
///     .filter("status", "active")
///     .sort("created_at", SortDirection::Desc);
///
/// let query = params.to_query().unwrap();
/// assert_eq!(query.last().unwrap(), &("limit".to_string(), "25".to_string()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groupby: Option<String>,
}

impl SearchParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Adds one filter entry, creating the filter map if needed.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Appends a sort column; earlier columns take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortField {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.groupby = Some(field.into());
        self
    }

    /// The requested page, or [`DEFAULT_PAGE`].
    pub fn resolved_page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE)
    }

    /// The requested page size, or [`DEFAULT_LIMIT`].
    pub fn resolved_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    /// Encodes these parameters as query pairs. See [`build_query`].
    pub fn to_query(&self) -> Result<Vec<(String, String)>> {
        build_query(Some(self))
    }
}

/// Builds the query pairs for a search request.
///
/// Order: `search`, `filter`, `sort`, `groupby`, then always `page` and
/// `limit`. Absent options are omitted; an empty `sort` counts as absent.
///
/// # Errors
///
/// Returns a validation error if `page` or `limit` is zero.
pub fn build_query(params: Option<&SearchParameters>) -> Result<Vec<(String, String)>> {
    let Some(params) = params else {
        return Ok(vec![
            ("page".to_string(), DEFAULT_PAGE.to_string()),
            ("limit".to_string(), DEFAULT_LIMIT.to_string()),
        ]);
    };

    let page = params.resolved_page();
    let limit = params.resolved_limit();
    if page == 0 {
        return Err(ApiError::validation("page must be at least 1"));
    }
    if limit == 0 {
        return Err(ApiError::validation("limit must be at least 1"));
    }

    let mut query = Vec::with_capacity(6);

    if let Some(search) = &params.search {
        query.push(("search".to_string(), search.clone()));
    }

    if let Some(filter) = &params.filter {
        query.push(("filter".to_string(), encode("filter", filter)?));
    }

    if !params.sort.is_empty() {
        query.push(("sort".to_string(), encode("sort", &params.sort)?));
    }

    if let Some(groupby) = &params.groupby {
        query.push(("groupby".to_string(), groupby.clone()));
    }

    query.push(("page".to_string(), page.to_string()));
    query.push(("limit".to_string(), limit.to_string()));

    Ok(query)
}

fn encode<T: Serialize + ?Sized>(name: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| ApiError::validation(format!("Failed to encode {}: {}", name, e)))
}
