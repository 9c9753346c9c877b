//! Indexed entity documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::guard::TenantId;
use crate::payload::Payload;

/// Identifies one document: an entity within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub tenant_id: TenantId,
    pub entity_id: String,
}

impl DocumentKey {
    pub fn new(tenant_id: TenantId, entity_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            entity_id: entity_id.into(),
        }
    }
}

/// The indexed representation of one entity within one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    /// The entity's identifier, unique within the tenant.
    pub entity_id: String,
    /// The owning tenant.
    pub tenant_id: TenantId,
    /// Ordering token. Writes with a lower version than stored are ignored.
    pub version: i64,
    /// Typed entity attributes.
    #[serde(default)]
    pub payload: Payload,
    /// Tombstone marker. Deleted documents never appear in search results.
    #[serde(default)]
    pub deleted: bool,
    /// Event time of the last applied change.
    pub updated_at: DateTime<Utc>,
    /// When the tombstone was written, for retention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl EntityDocument {
    /// Create a live document.
    pub fn new(
        tenant_id: TenantId,
        entity_id: impl Into<String>,
        payload: Payload,
        version: i64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            tenant_id,
            version,
            payload,
            deleted: false,
            updated_at,
            deleted_at: None,
        }
    }

    /// Create a tombstone carrying the last known payload.
    pub fn tombstone(
        tenant_id: TenantId,
        entity_id: impl Into<String>,
        payload: Payload,
        version: i64,
        updated_at: DateTime<Utc>,
        deleted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            tenant_id,
            version,
            payload,
            deleted: true,
            updated_at,
            deleted_at: Some(deleted_at),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.tenant_id.clone(), self.entity_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_round_trips_through_json() {
        let tenant = TenantId::parse("acme").unwrap();
        let doc = EntityDocument::new(
            tenant,
            "e-1",
            Payload::new().with("name", "Widget"),
            7,
            Utc::now(),
        );

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["tenant_id"], json!("acme"));
        assert_eq!(value["payload"]["name"], json!("Widget"));
        assert!(value.get("deleted_at").is_none());

        let parsed: EntityDocument = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_tombstone_is_deleted() {
        let now = Utc::now();
        let doc = EntityDocument::tombstone(
            TenantId::parse("acme").unwrap(),
            "e-1",
            Payload::new(),
            3,
            now,
            now,
        );
        assert!(doc.deleted);
        assert_eq!(doc.deleted_at, Some(now));
        assert_eq!(doc.key().entity_id, "e-1");
    }
}
