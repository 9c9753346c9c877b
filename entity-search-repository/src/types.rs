//! Request and response types for index store operations.

use crate::text::tokenize;
use entity_search_shared::{EntityDocument, FilterSet, TenantId};

/// Version rule applied by a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Apply only if the incoming version is strictly greater than the stored one.
    NewerThanStored,
    /// Apply only if the incoming version is greater than or equal to the stored one.
    AtLeastStored,
}

impl WriteCondition {
    /// Whether a write with `incoming` version may replace a document at `stored`.
    pub fn admits(&self, incoming: i64, stored: i64) -> bool {
        match self {
            Self::NewerThanStored => incoming > stored,
            Self::AtLeastStored => incoming >= stored,
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The document was written.
    Applied,
    /// The stored version won; nothing changed.
    Stale,
}

/// A tenant-scoped query against the index store.
///
/// The tenant is mandatory: there is no way to express an unscoped read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub tenant_id: TenantId,
    /// Free text, already trimmed. `None` means filter-only.
    pub text: Option<String>,
    pub filters: FilterSet,
    pub offset: usize,
    pub limit: usize,
}

impl StoreQuery {
    /// Create a query returning the first page of a tenant's documents.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            text: None,
            filters: FilterSet::default(),
            offset: 0,
            limit: 20,
        }
    }

    /// Set the free text. Blank text clears it.
    pub fn with_text(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        self.text = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Tokens of the free text, or `None` for a filter-only query.
    ///
    /// Text without any alphanumeric token yields an empty list and matches
    /// no document.
    pub fn text_tokens(&self) -> Option<Vec<String>> {
        self.text.as_deref().map(tokenize)
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn paginate(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// A matched document with its relevance score, if ranked by text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: EntityDocument,
    pub score: Option<f64>,
}

/// One page of matches plus the total match count before pagination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorePage {
    pub hits: Vec<ScoredDocument>,
    pub total: u64,
}

impl StorePage {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_condition_admits() {
        assert!(WriteCondition::NewerThanStored.admits(2, 1));
        assert!(!WriteCondition::NewerThanStored.admits(1, 1));
        assert!(WriteCondition::AtLeastStored.admits(1, 1));
        assert!(!WriteCondition::AtLeastStored.admits(0, 1));
    }

    #[test]
    fn test_blank_text_is_filter_only() {
        let tenant = TenantId::parse("acme").unwrap();
        let query = StoreQuery::new(tenant.clone()).with_text("   ");
        assert!(query.text.is_none());

        let query = StoreQuery::new(tenant).with_text(" widget ");
        assert_eq!(query.text.as_deref(), Some("widget"));
    }

    #[test]
    fn test_text_tokens() {
        let tenant = TenantId::parse("acme").unwrap();
        assert_eq!(StoreQuery::new(tenant.clone()).text_tokens(), None);
        assert_eq!(
            StoreQuery::new(tenant.clone()).with_text("Acme, Berlin").text_tokens(),
            Some(vec!["acme".to_string(), "berlin".to_string()])
        );
        assert_eq!(StoreQuery::new(tenant).with_text("!!!").text_tokens(), Some(Vec::new()));
    }
}
