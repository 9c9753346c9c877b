//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opensearch::{
    cluster::ClusterHealthParts,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::VersionType,
    DeleteByQueryParts, GetParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::config::OpenSearchConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::opensearch::queries::{build_purge_query, build_search_query};
use crate::types::{ScoredDocument, StorePage, StoreQuery, WriteCondition, WriteOutcome};
use entity_search_shared::{DocumentKey, EntityDocument};

/// OpenSearch client implementation.
///
/// All tenants share one index; every document carries its `tenant_id` and
/// every query filters on it. Conditional writes use OpenSearch external
/// versioning, so the version check happens inside the cluster.
///
/// # Example
///
/// ```ignore
/// use entity_search_repository::{OpenSearchClient, OpenSearchConfig};
/// let client = OpenSearchClient::new(&OpenSearchConfig::with_url("http://localhost:9200")).await?;
/// client.ensure_index_exists().await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client from the given configuration.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(config: &OpenSearchConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %config.url,
            alias = %config.index.alias,
            version = config.index.version,
            timeout_ms = config.request_timeout.as_millis() as u64,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config: config.index.clone(),
        })
    }

    /// Generate a document ID from tenant and entity IDs.
    ///
    /// Uses format: `{tenant_len}:{tenant_id}:{entity_id}`. The length prefix
    /// keeps IDs unambiguous whatever characters the identifiers contain.
    fn document_id(key: &DocumentKey) -> String {
        let tenant = key.tenant_id.as_str();
        format!("{}:{}:{}", tenant.len(), tenant, key.entity_id)
    }

    /// Parse a search hit into a scored document.
    ///
    /// Returns `None` if the hit's source is not a valid document.
    fn parse_hit(hit: &Value) -> Option<ScoredDocument> {
        let document: EntityDocument = serde_json::from_value(hit.get("_source")?.clone()).ok()?;
        let score = hit.get("_score").and_then(Value::as_f64);
        Some(ScoredDocument { document, score })
    }

    /// Parse a full search response body.
    fn parse_search_response(body: &Value) -> Result<StorePage, SearchIndexError> {
        let hits = body
            .get("hits")
            .ok_or_else(|| SearchIndexError::parse("search response has no hits"))?;
        let total = hits["total"]["value"].as_u64().unwrap_or(0);
        let hits = hits["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| {
                        let parsed = Self::parse_hit(hit);
                        if parsed.is_none() {
                            error!(hit = %hit, "Skipping unparseable search hit");
                        }
                        parsed
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(StorePage { hits, total })
    }

    fn transport_error(err: opensearch::Error) -> SearchIndexError {
        if err.is_timeout() {
            SearchIndexError::timeout(err.to_string())
        } else {
            SearchIndexError::connection(err.to_string())
        }
    }

    /// Turn a non-success response into an error built by `make`.
    async fn failure(
        response: Response,
        operation: &str,
        make: fn(String) -> SearchIndexError,
    ) -> SearchIndexError {
        let status = response.status_code();
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation, "Request failed");
        make(format!("{} failed with status {}: {}", operation, status, error_body))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    async fn get_document(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<EntityDocument>, SearchIndexError> {
        let doc_id = Self::document_id(key);

        let response = self
            .client
            .get(GetParts::IndexId(&self.index_config.alias, &doc_id))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::failure(response, "Get", SearchIndexError::QueryError).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        if body["found"] == Value::Bool(false) {
            return Ok(None);
        }
        let source = body
            .get("_source")
            .cloned()
            .ok_or_else(|| SearchIndexError::parse("get response has no _source"))?;
        serde_json::from_value(source)
            .map(Some)
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Index a document with external versioning.
    ///
    /// `NewerThanStored` maps to `version_type=external` and `AtLeastStored`
    /// to `external_gte`. A 409 version conflict means the stored version
    /// won and is reported as `WriteOutcome::Stale`.
    #[instrument(
        skip(self, document),
        fields(
            tenant_id = %document.tenant_id,
            entity_id = %document.entity_id,
            version = document.version
        )
    )]
    async fn put_document(
        &self,
        document: &EntityDocument,
        condition: WriteCondition,
    ) -> Result<WriteOutcome, SearchIndexError> {
        let doc_id = Self::document_id(&document.key());
        let version_type = match condition {
            WriteCondition::NewerThanStored => VersionType::External,
            WriteCondition::AtLeastStored => VersionType::ExternalGte,
        };
        let body = serde_json::to_value(document)
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.alias, &doc_id))
            .version(document.version)
            .version_type(version_type)
            .body(body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status_code();
        if status.as_u16() == 409 {
            debug!(doc_id = %doc_id, "Version conflict, keeping stored document");
            return Ok(WriteOutcome::Stale);
        }
        if !status.is_success() {
            return Err(Self::failure(response, "Index", SearchIndexError::IndexError).await);
        }

        debug!(doc_id = %doc_id, "Document indexed");
        Ok(WriteOutcome::Applied)
    }

    #[instrument(
        skip(self, query),
        fields(tenant_id = %query.tenant_id, offset = query.offset, limit = query.limit)
    )]
    async fn search(&self, query: &StoreQuery) -> Result<StorePage, SearchIndexError> {
        let body = build_search_query(query);

        let response = self
            .client
            .search(SearchParts::Index(&[&self.index_config.alias]))
            .body(body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status_code().is_success() {
            return Err(Self::failure(response, "Search", SearchIndexError::QueryError).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let page = Self::parse_search_response(&body)?;

        debug!(total = page.total, returned = page.hits.len(), "Search completed");
        Ok(page)
    }

    async fn purge_tombstones(
        &self,
        deleted_before: DateTime<Utc>,
    ) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[&self.index_config.alias]))
            .body(build_purge_query(deleted_before))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status_code().is_success() {
            return Err(Self::failure(response, "Purge", SearchIndexError::PurgeError).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let deleted = body["deleted"].as_u64().unwrap_or(0);

        info!(deleted = deleted, cutoff = %deleted_before, "Purged expired tombstones");
        Ok(deleted)
    }

    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&self.index_config.alias]))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status_code().is_success() {
            debug!(alias = %self.index_config.alias, "Index already exists");
            return Ok(());
        }

        let index_name = self.index_config.index_name();
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(get_index_settings(&self.index_config.alias))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status_code().is_success() {
            let make = SearchIndexError::IndexCreationError;
            return Err(Self::failure(response, "Index creation", make).await);
        }

        info!(index = %index_name, alias = %self.index_config.alias, "Created search index");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = body["status"].as_str().unwrap_or("red");
        debug!(status = status, "Cluster health");
        Ok(status != "red")
    }
}
