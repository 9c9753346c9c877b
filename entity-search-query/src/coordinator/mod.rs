//! Query coordinator.
//!
//! Validates a search, scopes it to the caller's tenant and translates the
//! store page into a [`SearchResponse`].

use std::sync::Arc;

use tracing::{debug, instrument};

use entity_search_repository::{SearchIndexProvider, StoreQuery};
use entity_search_shared::{FilterSet, SearchHit, SearchResponse, ServiceError, TenantId};

/// Default largest accepted page size.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Default deepest reachable result, mirroring OpenSearch's `index.max_result_window`.
pub const DEFAULT_MAX_RESULT_WINDOW: i64 = 10_000;

/// Pagination limits applied to every search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPolicy {
    pub max_page_size: i64,
    pub max_result_window: i64,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
        }
    }
}

/// Read-only coordinator over the index store.
pub struct QueryCoordinator {
    store: Arc<dyn SearchIndexProvider>,
    policy: QueryPolicy,
}

impl QueryCoordinator {
    pub fn new(store: Arc<dyn SearchIndexProvider>) -> Self {
        Self::with_policy(store, QueryPolicy::default())
    }

    pub fn with_policy(store: Arc<dyn SearchIndexProvider>, policy: QueryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &QueryPolicy {
        &self.policy
    }

    /// Search a tenant's live documents.
    ///
    /// # Arguments
    ///
    /// * `tenant_id` - The tenant whose documents are searched
    /// * `query` - Free text; empty means filter-only, ranked by recency
    /// * `filters` - Conjunctive field filters
    /// * `page` - 1-based page number
    /// * `page_size` - Items per page, at most `max_page_size`
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - The requested page and the total match count
    /// * `Err(ServiceError::InvalidInput)` - Empty tenant or bad pagination
    /// * `Err(ServiceError::StoreUnavailable)` - If the store fails
    #[instrument(skip(self, filters), fields(filter_count = filters.len()))]
    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
        filters: FilterSet,
        page: i64,
        page_size: i64,
    ) -> Result<SearchResponse, ServiceError> {
        let tenant_id = TenantId::parse(tenant_id)?;
        let (offset, limit) = self.window(page, page_size)?;

        let store_query = StoreQuery::new(tenant_id)
            .with_text(query)
            .with_filters(filters.clone())
            .paginate(offset, limit);
        let store_page = self.store.search(&store_query).await?;

        debug!(total = store_page.total, returned = store_page.hits.len(), "Search completed");

        let items = store_page
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                entity_id: hit.document.entity_id,
                version: hit.document.version,
                updated_at: hit.document.updated_at,
                payload: hit.document.payload,
                score: hit.score,
            })
            .collect();

        Ok(SearchResponse {
            items,
            total: store_page.total,
            page,
            page_size,
            query: query.to_string(),
            filters,
        })
    }

    /// Validate pagination and convert it to an offset and limit.
    fn window(&self, page: i64, page_size: i64) -> Result<(usize, usize), ServiceError> {
        if page < 1 {
            return Err(ServiceError::invalid_input("page must be >= 1"));
        }
        if page_size < 1 || page_size > self.policy.max_page_size {
            return Err(ServiceError::invalid_input(format!(
                "pageSize must be between 1 and {}",
                self.policy.max_page_size
            )));
        }

        let end = (page - 1)
            .checked_mul(page_size)
            .and_then(|offset| offset.checked_add(page_size))
            .filter(|end| *end <= self.policy.max_result_window)
            .ok_or_else(|| {
                ServiceError::invalid_input(format!(
                    "Result window is too large, page * pageSize must be <= {}",
                    self.policy.max_result_window
                ))
            })?;

        let offset = usize::try_from(end - page_size)
            .map_err(|_| ServiceError::invalid_input("page is out of range"))?;
        let limit = usize::try_from(page_size)
            .map_err(|_| ServiceError::invalid_input("pageSize is out of range"))?;
        Ok((offset, limit))
    }
}
