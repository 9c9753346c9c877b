//! Search index provider trait definition.
//!
//! This module defines the abstract interface for index store operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::SearchIndexError;
use crate::types::{StorePage, StoreQuery, WriteCondition, WriteOutcome};
use entity_search_shared::{DocumentKey, EntityDocument};

/// Abstracts the underlying index store implementation (OpenSearch, in-memory, etc.).
///
/// Implementations are shared between the index coordinator (the only
/// writer) and the query coordinator (read-only). Writes to one document key
/// are serialized by the store using the document version as an optimistic
/// concurrency token, so callers need no locks of their own.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Fetch a document, including tombstones.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(EntityDocument))` - The stored document
    /// * `Ok(None)` - If no document exists for the key
    /// * `Err(SearchIndexError)` - If the lookup fails
    async fn get_document(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<EntityDocument>, SearchIndexError>;

    /// Write a document if its version satisfies `condition` against the stored one.
    ///
    /// A missing document is always written.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome::Applied)` - The document was written
    /// * `Ok(WriteOutcome::Stale)` - The stored version won the race
    /// * `Err(SearchIndexError)` - If the write fails
    async fn put_document(
        &self,
        document: &EntityDocument,
        condition: WriteCondition,
    ) -> Result<WriteOutcome, SearchIndexError>;

    /// Search the tenant's live (non-deleted) documents.
    ///
    /// Results are ordered by relevance when the query has text, by recency
    /// otherwise. `total` counts all matches before pagination.
    async fn search(&self, query: &StoreQuery) -> Result<StorePage, SearchIndexError>;

    /// Remove tombstones written before `deleted_before`.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - The number of purged documents
    /// * `Err(SearchIndexError)` - If the purge fails
    async fn purge_tombstones(
        &self,
        deleted_before: DateTime<Utc>,
    ) -> Result<u64, SearchIndexError>;

    /// Ensure the index exists with proper mappings.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Check if the store is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
