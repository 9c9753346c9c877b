//! Search request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::FilterSet;
use crate::payload::Payload;

/// Default page when the request omits it.
pub const DEFAULT_PAGE: i64 = 1;

/// Default page size when the request omits it.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

/// Body of a search request. The tenant comes from the caller's identity,
/// never from the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Free-text query; may be empty.
    #[serde(default)]
    pub query: String,
    /// Conjunctive filters keyed by payload field.
    #[serde(default)]
    pub filters: FilterSet,
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: FilterSet::default(),
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One matched document in a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub entity_id: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub payload: Payload,
    /// Relevance score; absent for filter-only queries ranked by recency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub items: Vec<SearchHit>,
    /// Number of matches before pagination.
    pub total: u64,
    pub page: i64,
    pub page_size: i64,
    pub query: String,
    pub filters: FilterSet,
}
