//! In-memory index store.
//!
//! Used by tests and the `memory` backend. Conditional writes are checked
//! under the store's write lock, which gives the same per-document
//! serialization the OpenSearch backend gets from external versioning.

mod text;

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{ScoredDocument, StorePage, StoreQuery, WriteCondition, WriteOutcome};
use entity_search_shared::{DocumentKey, EntityDocument};

pub use text::relevance;

/// A process-local index store.
#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<DocumentKey, EntityDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, tombstones included.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn rank(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
        let by_score = match (a.score, b.score) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };
        by_score
            .then_with(|| b.document.updated_at.cmp(&a.document.updated_at))
            .then_with(|| a.document.entity_id.cmp(&b.document.entity_id))
    }
}

#[async_trait]
impl SearchIndexProvider for InMemorySearchIndex {
    async fn get_document(
        &self,
        key: &DocumentKey,
    ) -> Result<Option<EntityDocument>, SearchIndexError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

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
        let mut documents = self.documents.write().await;
        let key = document.key();

        if let Some(stored) = documents.get(&key) {
            if !condition.admits(document.version, stored.version) {
                debug!(stored_version = stored.version, "Rejected stale write");
                return Ok(WriteOutcome::Stale);
            }
        }

        documents.insert(key, document.clone());
        Ok(WriteOutcome::Applied)
    }

    async fn search(&self, query: &StoreQuery) -> Result<StorePage, SearchIndexError> {
        let query_tokens = match query.text_tokens() {
            Some(tokens) if tokens.is_empty() => return Ok(StorePage::empty()),
            tokens => tokens.unwrap_or_default(),
        };
        let documents = self.documents.read().await;

        let mut matches: Vec<ScoredDocument> = documents
            .values()
            .filter(|doc| doc.tenant_id == query.tenant_id && !doc.deleted)
            .filter(|doc| query.filters.matches(&doc.payload))
            .filter_map(|doc| {
                let score = if query_tokens.is_empty() {
                    None
                } else {
                    Some(relevance(&query_tokens, &doc.payload)?)
                };
                Some(ScoredDocument {
                    document: doc.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(Self::rank);

        let total = matches.len() as u64;
        let hits = matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(StorePage { hits, total })
    }

    async fn purge_tombstones(
        &self,
        deleted_before: DateTime<Utc>,
    ) -> Result<u64, SearchIndexError> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, doc| {
            !(doc.deleted && doc.deleted_at.is_some_and(|deleted_at| deleted_at < deleted_before))
        });
        Ok((before - documents.len()) as u64)
    }

    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use entity_search_shared::{FilterSet, Payload, TenantId};
    use serde_json::json;
    use uuid::Uuid;

    fn tenant(name: &str) -> TenantId {
        TenantId::parse(name).unwrap()
    }

    fn document(tenant_id: &TenantId, entity_id: &str, name: &str, version: i64) -> EntityDocument {
        EntityDocument::new(
            tenant_id.clone(),
            entity_id,
            Payload::new().with("name", name),
            version,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");
        let doc = document(&acme, "e-1", "Widget", 1);

        let outcome = store.put_document(&doc, WriteCondition::NewerThanStored).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);

        let stored = store.get_document(&doc.key()).await.unwrap();
        assert_eq!(stored, Some(doc));
    }

    #[tokio::test]
    async fn test_conditional_write_rejects_older_versions() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");

        store
            .put_document(&document(&acme, "e-1", "v2", 2), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        let outcome = store
            .put_document(&document(&acme, "e-1", "v1", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Stale);

        let outcome = store
            .put_document(&document(&acme, "e-1", "v2 again", 2), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Stale);

        let outcome = store
            .put_document(&document(&acme, "e-1", "v2 tie", 2), WriteCondition::AtLeastStored)
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
    }

    #[tokio::test]
    async fn test_search_is_tenant_scoped() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");
        let globex = tenant("globex");

        store
            .put_document(&document(&acme, "e-1", "Widget", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        store
            .put_document(&document(&globex, "e-1", "Widget", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();

        let page = store
            .search(&StoreQuery::new(acme.clone()).with_text("widget"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.hits[0].document.tenant_id, acme);
    }

    #[tokio::test]
    async fn test_search_excludes_tombstones() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");
        let now = Utc::now();

        let tombstone = EntityDocument::tombstone(acme.clone(), "e-1", Payload::new(), 2, now, now);
        store.put_document(&tombstone, WriteCondition::AtLeastStored).await.unwrap();

        let page = store.search(&StoreQuery::new(acme)).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.hits.is_empty());
    }

    #[tokio::test]
    async fn test_filter_only_search_orders_by_recency() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");
        let base = Utc::now();

        for (i, id) in ["old", "newest", "middle"].iter().enumerate() {
            let offset = match *id {
                "old" => 0,
                "middle" => 1,
                _ => 2,
            };
            let doc = EntityDocument::new(
                acme.clone(),
                *id,
                Payload::new().with("status", "active"),
                i as i64,
                base + Duration::seconds(offset),
            );
            store.put_document(&doc, WriteCondition::NewerThanStored).await.unwrap();
        }

        let filters = FilterSet::try_from(json!({ "status": "active" })).unwrap();
        let page = store
            .search(&StoreQuery::new(acme).with_filters(filters))
            .await
            .unwrap();

        let order: Vec<&str> = page.hits.iter().map(|h| h.document.entity_id.as_str()).collect();
        assert_eq!(order, vec!["newest", "middle", "old"]);
        assert!(page.hits.iter().all(|h| h.score.is_none()));
    }

    #[tokio::test]
    async fn test_text_search_orders_by_relevance() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");

        store
            .put_document(&document(&acme, "partial", "Acmeville", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        store
            .put_document(&document(&acme, "exact", "Acme Acme", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();
        store
            .put_document(&document(&acme, "none", "Globex", 1), WriteCondition::NewerThanStored)
            .await
            .unwrap();

        let page = store
            .search(&StoreQuery::new(acme).with_text("acme"))
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.hits[0].document.entity_id, "exact");
        assert_eq!(page.hits[1].document.entity_id, "partial");
    }

    #[tokio::test]
    async fn test_text_without_tokens_matches_nothing() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");

        for name in ["Widget", "Gadget"] {
            let doc = document(&acme, &Uuid::new_v4().to_string(), name, 1);
            store.put_document(&doc, WriteCondition::NewerThanStored).await.unwrap();
        }

        let page = store
            .search(&StoreQuery::new(acme).with_text("!!!"))
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.hits.is_empty());
    }

    #[tokio::test]
    async fn test_pagination_reports_full_total() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");

        for _ in 0..25 {
            let doc = document(&acme, &Uuid::new_v4().to_string(), "Item", 1);
            store.put_document(&doc, WriteCondition::NewerThanStored).await.unwrap();
        }

        let page = store
            .search(&StoreQuery::new(acme).paginate(20, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.hits.len(), 5);
    }

    #[tokio::test]
    async fn test_purge_only_removes_expired_tombstones() {
        let store = InMemorySearchIndex::new();
        let acme = tenant("acme");
        let now = Utc::now();

        let expired =
            EntityDocument::tombstone(acme.clone(), "expired", Payload::new(), 1, now, now - Duration::hours(48));
        let fresh = EntityDocument::tombstone(acme.clone(), "fresh", Payload::new(), 1, now, now);
        let live = document(&acme, "live", "Widget", 1);

        for doc in [&expired, &fresh, &live] {
            store.put_document(doc, WriteCondition::AtLeastStored).await.unwrap();
        }

        let purged = store.purge_tombstones(now - Duration::hours(24)).await.unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.len().await, 2);
        assert!(store.get_document(&expired.key()).await.unwrap().is_none());
    }
}
