//! Configuration types for the OpenSearch store.

use std::time::Duration;

use crate::opensearch::IndexConfig;

/// Default OpenSearch URL.
pub const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Configuration for the OpenSearchClient.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// The OpenSearch server URL.
    pub url: String,
    /// Per-request timeout. Requests exceeding it surface as retryable failures.
    pub request_timeout: Duration,
    /// Alias and version of the document index.
    pub index: IndexConfig,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OPENSEARCH_URL.to_string(),
            request_timeout: Duration::from_secs(5),
            index: IndexConfig::default(),
        }
    }
}

impl OpenSearchConfig {
    /// Create a config for the given URL with default timeout and index.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
