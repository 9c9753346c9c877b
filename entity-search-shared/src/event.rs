//! Entity lifecycle change events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::guard::TenantId;
use crate::payload::Payload;

/// Kind of lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEventKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl FromStr for ChangeEventKind {
    type Err = ServiceError;

    /// Accepts both bare names and the `entity.`-prefixed bus detail types.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix("entity.").unwrap_or(s) {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(ServiceError::invalid_input(format!("Unknown event type: {}", s))),
        }
    }
}

impl fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated change event, consumed once by the index coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeEventKind,
    pub tenant_id: TenantId,
    pub entity_id: String,
    /// Present for created and updated events.
    pub payload: Option<Payload>,
    /// When the change happened at the source.
    pub timestamp: DateTime<Utc>,
    /// Ordering token; defaults to the timestamp in epoch milliseconds.
    pub version: i64,
}

impl ChangeEvent {
    /// Build a created event versioned by its timestamp.
    pub fn created(
        tenant_id: TenantId,
        entity_id: impl Into<String>,
        payload: Payload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ChangeEventKind::Created,
            tenant_id,
            entity_id: entity_id.into(),
            payload: Some(payload),
            timestamp,
            version: timestamp.timestamp_millis(),
        }
    }

    /// Build an updated event versioned by its timestamp.
    pub fn updated(
        tenant_id: TenantId,
        entity_id: impl Into<String>,
        payload: Payload,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ChangeEventKind::Updated,
            ..Self::created(tenant_id, entity_id, payload, timestamp)
        }
    }

    /// Build a deleted event versioned by its timestamp.
    pub fn deleted(
        tenant_id: TenantId,
        entity_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ChangeEventKind::Deleted,
            tenant_id,
            entity_id: entity_id.into(),
            payload: None,
            timestamp,
            version: timestamp.timestamp_millis(),
        }
    }

    /// Override the version, e.g. when the source carries its own counter.
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }
}
