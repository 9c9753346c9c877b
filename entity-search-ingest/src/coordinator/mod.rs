//! Index coordinator.
//!
//! Applies entity lifecycle changes to the index store. Every write is
//! conditional on the document version, so duplicated, replayed or
//! reordered deliveries converge on the state of the highest version.

mod policy;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use entity_search_repository::{SearchIndexProvider, WriteCondition, WriteOutcome};
use entity_search_shared::{
    ChangeEvent, ChangeEventKind, DocumentKey, EntityDocument, Payload, ServiceError, TenantId,
};

pub use policy::IndexPolicy;

/// What applying a change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The change was written.
    Applied,
    /// A document with a newer (or, for creates and updates, equal) version is stored.
    Stale,
    /// Delete of an entity that was never indexed.
    NotFound,
}

impl From<WriteOutcome> for IndexOutcome {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Applied => Self::Applied,
            WriteOutcome::Stale => Self::Stale,
        }
    }
}

/// Exclusive writer of tenants' document sets.
pub struct IndexCoordinator {
    store: Arc<dyn SearchIndexProvider>,
    policy: IndexPolicy,
}

impl IndexCoordinator {
    /// Create a coordinator with the default policy.
    pub fn new(store: Arc<dyn SearchIndexProvider>) -> Self {
        Self::with_policy(store, IndexPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn SearchIndexProvider>, policy: IndexPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &IndexPolicy {
        &self.policy
    }

    fn validate(
        tenant_id: &str,
        entity_id: &str,
        version: i64,
    ) -> Result<DocumentKey, ServiceError> {
        let tenant_id = TenantId::parse(tenant_id)?;
        let entity_id = entity_id.trim();
        if entity_id.is_empty() {
            return Err(ServiceError::invalid_input("entity_id is required"));
        }
        // External versioning in the index store only accepts non-negative versions.
        if version < 0 {
            return Err(ServiceError::invalid_input("version must not be negative"));
        }
        Ok(DocumentKey::new(tenant_id, entity_id))
    }

    /// Index a new entity.
    ///
    /// No-op if a document with the same or a newer version is already stored.
    #[instrument(skip(self, payload, occurred_at))]
    pub async fn apply_create(
        &self,
        tenant_id: &str,
        entity_id: &str,
        payload: Payload,
        version: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<IndexOutcome, ServiceError> {
        self.upsert(tenant_id, entity_id, payload, version, occurred_at)
            .await
    }

    /// Replace an entity's payload, creating the document if it is missing.
    ///
    /// Same version rule as [`apply_create`](Self::apply_create); a newer
    /// update revives a tombstoned document.
    #[instrument(skip(self, payload, occurred_at))]
    pub async fn apply_update(
        &self,
        tenant_id: &str,
        entity_id: &str,
        payload: Payload,
        version: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<IndexOutcome, ServiceError> {
        self.upsert(tenant_id, entity_id, payload, version, occurred_at)
            .await
    }

    async fn upsert(
        &self,
        tenant_id: &str,
        entity_id: &str,
        payload: Payload,
        version: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<IndexOutcome, ServiceError> {
        let key = Self::validate(tenant_id, entity_id, version)?;
        let document =
            EntityDocument::new(key.tenant_id, key.entity_id, payload, version, occurred_at);

        let outcome = self
            .store
            .put_document(&document, WriteCondition::NewerThanStored)
            .await?;

        match outcome {
            WriteOutcome::Applied => info!("Indexed entity"),
            WriteOutcome::Stale => debug!("Ignored stale change"),
        }
        Ok(outcome.into())
    }

    /// Tombstone an entity.
    ///
    /// Applies when the incoming version is at least the stored one, so a
    /// delete wins a tie against a create or update. The last known payload
    /// is retained on the tombstone. Deleting an unknown entity is a no-op
    /// unless [`IndexPolicy::record_unknown_deletes`] is set.
    #[instrument(skip(self, occurred_at))]
    pub async fn apply_delete(
        &self,
        tenant_id: &str,
        entity_id: &str,
        version: i64,
        occurred_at: DateTime<Utc>,
    ) -> Result<IndexOutcome, ServiceError> {
        let key = Self::validate(tenant_id, entity_id, version)?;

        let payload = match self.store.get_document(&key).await? {
            Some(stored)
                if stored.version > version || (stored.deleted && stored.version == version) =>
            {
                debug!(stored_version = stored.version, "Ignored stale delete");
                return Ok(IndexOutcome::Stale);
            }
            Some(stored) => stored.payload,
            None if self.policy.record_unknown_deletes => Payload::new(),
            None => {
                debug!("Delete for unknown entity ignored");
                return Ok(IndexOutcome::NotFound);
            }
        };

        let tombstone = EntityDocument::tombstone(
            key.tenant_id,
            key.entity_id,
            payload,
            version,
            occurred_at,
            Utc::now(),
        );
        let outcome = self
            .store
            .put_document(&tombstone, WriteCondition::AtLeastStored)
            .await?;

        match outcome {
            WriteOutcome::Applied => info!("Tombstoned entity"),
            WriteOutcome::Stale => debug!("Ignored stale delete"),
        }
        Ok(outcome.into())
    }

    /// Apply a validated change event.
    pub async fn apply(&self, event: ChangeEvent) -> Result<IndexOutcome, ServiceError> {
        let ChangeEvent {
            kind,
            tenant_id,
            entity_id,
            payload,
            timestamp,
            version,
        } = event;

        let require_payload = |payload: Option<Payload>| {
            payload.ok_or_else(|| {
                ServiceError::invalid_input(format!("payload is required for {} events", kind))
            })
        };

        match kind {
            ChangeEventKind::Created => {
                let payload = require_payload(payload)?;
                self.apply_create(tenant_id.as_str(), &entity_id, payload, version, timestamp)
                    .await
            }
            ChangeEventKind::Updated => {
                let payload = require_payload(payload)?;
                self.apply_update(tenant_id.as_str(), &entity_id, payload, version, timestamp)
                    .await
            }
            ChangeEventKind::Deleted => {
                self.apply_delete(tenant_id.as_str(), &entity_id, version, timestamp)
                    .await
            }
        }
    }

    /// Purge tombstones older than the retention window, measured from `now`.
    #[instrument(skip(self))]
    pub async fn purge_expired_tombstones(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let retention = chrono::Duration::from_std(self.policy.tombstone_retention).map_err(|e| {
            ServiceError::invalid_input(format!("tombstone retention out of range: {}", e))
        })?;
        let purged = self.store.purge_tombstones(now - retention).await?;
        Ok(purged)
    }
}
