//! Entity change receiver.
//!
//! Entry point for entity lifecycle events delivered by the event transport.
//! Each event is decoded, its tenant resolved through the guard and the
//! change handed to the [`IndexCoordinator`]. The response tells the
//! transport whether redelivery makes sense.

mod inbound;

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn, Instrument};

use crate::coordinator::{IndexCoordinator, IndexOutcome};
use entity_search_shared::{ChangeEventKind, RequestContext, ServiceError};

pub use inbound::decode_event;

/// Default maximum number of events accepted in one batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Configuration for the receiver.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Largest batch accepted by [`EntityChangeReceiver::handle_batch`].
    pub max_batch_size: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Result of handling one event, as reported to the event transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub status_code: u16,
    pub message: String,
    /// Whether the transport should redeliver the event.
    pub retryable: bool,
}

impl EventResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

impl From<&ServiceError> for EventResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            status_code: err.status_code(),
            message: err.message().to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Result of a single event within a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationResult {
    /// The entity id, when the event carried one.
    pub entity_id: Option<String>,
    /// Whether the event was handled.
    pub success: bool,
    pub response: EventResponse,
}

/// Summary of a batch containing aggregate counts and per-event results.
///
/// Results are in the order the events were submitted, so callers can
/// redeliver exactly the failed, retryable ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOperationSummary {
    /// Total number of events in the batch.
    pub total: usize,
    /// Number of events handled.
    pub succeeded: usize,
    /// Number of events rejected or failed.
    pub failed: usize,
    /// Individual results for each event.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Whether any failed event should be redelivered.
    pub fn has_retryable_failures(&self) -> bool {
        self.results.iter().any(|r| r.response.retryable)
    }
}

/// Receives entity change events and applies them through the index coordinator.
pub struct EntityChangeReceiver {
    coordinator: Arc<IndexCoordinator>,
    config: ReceiverConfig,
}

impl EntityChangeReceiver {
    /// Create a new receiver with the default configuration.
    pub fn new(coordinator: Arc<IndexCoordinator>) -> Self {
        Self::with_config(coordinator, ReceiverConfig::default())
    }

    /// Create a new receiver with custom configuration.
    pub fn with_config(coordinator: Arc<IndexCoordinator>, config: ReceiverConfig) -> Self {
        Self { coordinator, config }
    }

    /// Handle one decoded JSON event.
    pub async fn handle(&self, ctx: &RequestContext, raw: &Value) -> EventResponse {
        self.process(ctx, raw).instrument(ctx.span().clone()).await
    }

    /// Handle one event from its raw JSON text.
    pub async fn handle_json(&self, ctx: &RequestContext, body: &str) -> EventResponse {
        match serde_json::from_str::<Value>(body) {
            Ok(raw) => self.handle(ctx, &raw).await,
            Err(e) => {
                let err = ServiceError::invalid_input(format!("Malformed event body: {}", e));
                ctx.span().in_scope(|| warn!(error = %err, "Rejected event"));
                EventResponse::from(&err)
            }
        }
    }

    /// Handle a batch of events concurrently.
    ///
    /// Each event runs in its own child context, so a failure of one event
    /// never affects the others. Only an oversized batch is rejected as a whole.
    pub async fn handle_batch(
        &self,
        ctx: &RequestContext,
        events: Vec<Value>,
    ) -> Result<BatchOperationSummary, ServiceError> {
        if events.len() > self.config.max_batch_size {
            let err = ServiceError::invalid_input(format!(
                "Batch of {} events exceeds the maximum of {}",
                events.len(),
                self.config.max_batch_size
            ));
            ctx.span().in_scope(|| warn!(error = %err, "Rejected batch"));
            return Err(err);
        }

        let futures = events.iter().map(|raw| async move {
            let child = ctx.child("ingest");
            let response = self.handle(&child, raw).await;
            BatchOperationResult {
                entity_id: entity_id_hint(raw),
                success: response.is_success(),
                response,
            }
        });
        let summary = BatchOperationSummary::from_results(join_all(futures).await);

        ctx.span().in_scope(|| {
            info!(
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Batch handled"
            )
        });
        Ok(summary)
    }

    async fn process(&self, ctx: &RequestContext, raw: &Value) -> EventResponse {
        let event = match decode_event(raw) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "Rejected event");
                return EventResponse::from(&err);
            }
        };
        ctx.record_tenant(&event.tenant_id);

        let kind = event.kind;
        let entity_id = event.entity_id.clone();
        let version = event.version;

        match self.coordinator.apply(event).await {
            Ok(outcome) => {
                let message = response_message(kind, outcome, &entity_id);
                info!(
                    entity_id = %entity_id,
                    version,
                    kind = %kind,
                    outcome = ?outcome,
                    "Event handled"
                );
                EventResponse::ok(message)
            }
            Err(err) => {
                if err.is_retryable() {
                    error!(entity_id = %entity_id, error = %err, "Failed to apply event");
                } else {
                    warn!(entity_id = %entity_id, error = %err, "Rejected event");
                }
                EventResponse::from(&err)
            }
        }
    }
}

fn response_message(kind: ChangeEventKind, outcome: IndexOutcome, entity_id: &str) -> String {
    match (outcome, kind) {
        (IndexOutcome::Stale, _) => format!("Skipped stale event for {}", entity_id),
        (IndexOutcome::NotFound, _) => format!("Nothing to delete for {}", entity_id),
        (IndexOutcome::Applied, ChangeEventKind::Created) => format!("Indexed {}", entity_id),
        (IndexOutcome::Applied, ChangeEventKind::Updated) => format!("Updated {}", entity_id),
        (IndexOutcome::Applied, ChangeEventKind::Deleted) => format!("Deleted {}", entity_id),
    }
}

/// Best-effort entity id of an event that may not have decoded.
fn entity_id_hint(raw: &Value) -> Option<String> {
    raw.get("entityId")
        .or_else(|| raw.get("detail").and_then(|detail| detail.get("entityId")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use entity_search_repository::{
        InMemorySearchIndex, SearchIndexError, SearchIndexProvider, StorePage, StoreQuery, WriteCondition,
        WriteOutcome,
    };
    use entity_search_shared::{DocumentKey, EntityDocument, TenantId};
    use serde_json::json;
    use tokio::sync::Mutex;

    /// Provider that records writes and can be switched to fail.
    struct MockProvider {
        written: Mutex<Vec<EntityDocument>>,
        should_fail: bool,
    }

    impl MockProvider {
        fn new(should_fail: bool) -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                should_fail,
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn get_document(&self, key: &DocumentKey) -> Result<Option<EntityDocument>, SearchIndexError> {
            if self.should_fail {
                return Err(SearchIndexError::connection("Mock failure"));
            }
            let written = self.written.lock().await;
            Ok(written.iter().rev().find(|d| &d.key() == key).cloned())
        }

        async fn put_document(
            &self,
            document: &EntityDocument,
            _condition: WriteCondition,
        ) -> Result<WriteOutcome, SearchIndexError> {
            if self.should_fail {
                return Err(SearchIndexError::timeout("Mock failure"));
            }
            self.written.lock().await.push(document.clone());
            Ok(WriteOutcome::Applied)
        }

        async fn search(&self, _query: &StoreQuery) -> Result<StorePage, SearchIndexError> {
            Ok(StorePage::empty())
        }

        async fn purge_tombstones(&self, _deleted_before: DateTime<Utc>) -> Result<u64, SearchIndexError> {
            Ok(0)
        }

        async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(!self.should_fail)
        }
    }

    fn receiver_with(store: Arc<dyn SearchIndexProvider>) -> EntityChangeReceiver {
        EntityChangeReceiver::new(Arc::new(IndexCoordinator::new(store)))
    }

    fn created(entity_id: &str, version: i64) -> Value {
        json!({
            "type": "created",
            "tenantId": "acme",
            "entityId": entity_id,
            "payload": {"name": "Widget"},
            "timestamp": "2024-05-01T10:00:00Z",
            "version": version
        })
    }

    #[tokio::test]
    async fn test_created_event_is_indexed() {
        let store = Arc::new(InMemorySearchIndex::new());
        let receiver = receiver_with(store.clone());
        let ctx = RequestContext::new("ingest");

        let response = receiver.handle(&ctx, &created("e-1", 1)).await;

        assert_eq!(response, EventResponse::ok("Indexed e-1"));
        let key = DocumentKey::new(TenantId::parse("acme").unwrap(), "e-1");
        assert!(store.get_document(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_and_delete_messages() {
        let receiver = receiver_with(Arc::new(InMemorySearchIndex::new()));
        let ctx = RequestContext::new("ingest");

        receiver.handle(&ctx, &created("e-1", 1)).await;
        let updated = receiver
            .handle(
                &ctx,
                &json!({
                    "detail-type": "entity.updated",
                    "time": "2024-05-01T11:00:00Z",
                    "detail": {"tenantId": "acme", "entityId": "e-1", "version": 2, "name": "Gadget"}
                }),
            )
            .await;
        let deleted = receiver
            .handle(
                &ctx,
                &json!({"type": "deleted", "tenantId": "acme", "entityId": "e-1", "timestamp": 3, "version": 3}),
            )
            .await;

        assert_eq!(updated.message, "Updated e-1");
        assert_eq!(deleted.message, "Deleted e-1");
    }

    #[tokio::test]
    async fn test_replayed_event_is_skipped_with_success() {
        let receiver = receiver_with(Arc::new(InMemorySearchIndex::new()));
        let ctx = RequestContext::new("ingest");

        receiver.handle(&ctx, &created("e-1", 1)).await;
        let replay = receiver.handle(&ctx, &created("e-1", 1)).await;

        assert_eq!(replay.status_code, 200);
        assert_eq!(replay.message, "Skipped stale event for e-1");
    }

    #[tokio::test]
    async fn test_rejections_map_to_status_codes() {
        let receiver = receiver_with(Arc::new(InMemorySearchIndex::new()));
        let ctx = RequestContext::new("ingest");

        let unknown = receiver
            .handle(&ctx, &json!({"type": "archived", "tenantId": "acme", "entityId": "e-1"}))
            .await;
        assert_eq!(unknown.status_code, 400);
        assert!(!unknown.retryable);

        let no_tenant = receiver
            .handle(&ctx, &json!({"type": "deleted", "entityId": "e-1", "timestamp": 1}))
            .await;
        assert_eq!(no_tenant.status_code, 401);

        let malformed = receiver.handle_json(&ctx, "{not json").await;
        assert_eq!(malformed.status_code, 400);
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        let receiver = receiver_with(Arc::new(MockProvider::new(true)));
        let ctx = RequestContext::new("ingest");

        let response = receiver.handle(&ctx, &created("e-1", 1)).await;

        assert_eq!(response.status_code, 503);
        assert!(response.retryable);
    }

    #[tokio::test]
    async fn test_batch_reports_each_event() {
        let store = Arc::new(MockProvider::new(false));
        let receiver = receiver_with(store.clone());
        let ctx = RequestContext::new("ingest_batch");

        let events = vec![
            created("e-1", 1),
            json!({"type": "created", "entityId": "e-2", "payload": {}, "timestamp": 1}),
            created("e-3", 1),
        ];
        let summary = receiver.handle_batch(&ctx, events).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.has_retryable_failures());
        assert_eq!(summary.results[1].entity_id.as_deref(), Some("e-2"));
        assert_eq!(summary.results[1].response.status_code, 401);
        assert_eq!(store.written.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let coordinator = Arc::new(IndexCoordinator::new(Arc::new(InMemorySearchIndex::new())));
        let receiver = EntityChangeReceiver::with_config(coordinator, ReceiverConfig { max_batch_size: 2 });
        let ctx = RequestContext::new("ingest_batch");

        let events = (0..3).map(|i| created(&format!("e-{}", i), 1)).collect();
        let err = receiver.handle_batch(&ctx, events).await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}
