//! Dependency initialization and wiring for the entity search service.

use std::sync::Arc;
use tracing::info;

use super::{Backend, ServiceConfig};
use crate::AppError;
use entity_search_ingest::{EntityChangeReceiver, IndexCoordinator, TombstoneJanitor};
use entity_search_query::{QueryCoordinator, SearchHandler};
use entity_search_repository::{InMemorySearchIndex, OpenSearchClient, SearchIndexProvider};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The index store shared by both coordinators.
    pub store: Arc<dyn SearchIndexProvider>,
    pub index_coordinator: Arc<IndexCoordinator>,
    pub receiver: Arc<EntityChangeReceiver>,
    pub search_handler: Arc<SearchHandler>,
    pub janitor: Arc<TombstoneJanitor>,
}

impl Dependencies {
    /// Initialize all dependencies for the given configuration.
    ///
    /// For the OpenSearch backend the cluster must be reachable and healthy;
    /// the index and its alias are created if missing.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(AppError)` - If initialization fails
    pub async fn new(config: &ServiceConfig) -> Result<Self, AppError> {
        info!(
            backend = ?config.backend,
            opensearch_url = %config.opensearch.url,
            index = %config.opensearch.index.index_name(),
            "Initializing dependencies"
        );

        let store: Arc<dyn SearchIndexProvider> = match config.backend {
            Backend::Memory => Arc::new(InMemorySearchIndex::new()),
            Backend::OpenSearch => {
                let client = OpenSearchClient::new(&config.opensearch).await.map_err(|e| {
                    AppError::config(format!("Failed to create OpenSearch client: {}", e))
                })?;

                let healthy = client.health_check().await.map_err(|e| {
                    AppError::config(format!("OpenSearch health check failed: {}", e))
                })?;
                if !healthy {
                    return Err(AppError::config("OpenSearch cluster is unhealthy"));
                }
                info!("OpenSearch connection verified");

                client.ensure_index_exists().await?;
                Arc::new(client)
            }
        };

        Ok(Self::with_store(store, config))
    }

    /// Wire the coordinators and handlers around an existing store.
    pub fn with_store(store: Arc<dyn SearchIndexProvider>, config: &ServiceConfig) -> Self {
        let index_coordinator = Arc::new(IndexCoordinator::with_policy(
            store.clone(),
            config.index_policy.clone(),
        ));
        let receiver = Arc::new(EntityChangeReceiver::with_config(
            index_coordinator.clone(),
            config.receiver.clone(),
        ));
        let query_coordinator = Arc::new(QueryCoordinator::with_policy(
            store.clone(),
            config.query_policy.clone(),
        ));
        let search_handler = Arc::new(SearchHandler::new(query_coordinator));
        let janitor = Arc::new(TombstoneJanitor::with_interval(
            index_coordinator.clone(),
            config.purge_interval,
        ));

        Self {
            store,
            index_coordinator,
            receiver,
            search_handler,
            janitor,
        }
    }
}
