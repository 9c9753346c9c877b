//! Tenant isolation guard.
//!
//! Every handler resolves the caller's tenant through [`TenantGuard`] before
//! touching the index store. The only way to obtain a [`TenantId`] is through
//! validation, so store queries cannot be expressed without a tenant scope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// A validated, non-empty tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate a raw tenant identifier. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::invalid_input("tenant_id is required"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejects requests that do not carry a tenant identity.
pub struct TenantGuard;

impl TenantGuard {
    /// Resolve the tenant identity handed over by the authentication layer.
    ///
    /// A missing or blank identity is `Unauthorized`.
    pub fn authorize(tenant: Option<&str>) -> Result<TenantId, ServiceError> {
        match tenant {
            Some(raw) if !raw.trim().is_empty() => TenantId::parse(raw),
            _ => {
                tracing::warn!("Rejected request without tenant identity");
                Err(ServiceError::unauthorized("Missing tenant_id in token"))
            }
        }
    }
}
