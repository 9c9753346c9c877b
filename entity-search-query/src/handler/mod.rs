//! JSON search request handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn, Instrument};

use crate::coordinator::QueryCoordinator;
use entity_search_shared::{QueryRequest, RequestContext, SearchResponse, ServiceError, TenantGuard};

const CONTENT_TYPE: &str = "Content-Type";
const APPLICATION_JSON: &str = "application/json";

/// Transport-neutral HTTP-style response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    fn json(status_code: u16, body: String) -> Self {
        let headers = BTreeMap::from([(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())]);
        Self {
            status_code,
            headers,
            body,
        }
    }

    fn error(err: &ServiceError) -> Self {
        let body = if err.is_retryable() {
            json!({ "error": err.message(), "retryable": true })
        } else {
            json!({ "error": err.message() })
        };
        Self::json(err.status_code(), body.to_string())
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Handles search requests on behalf of an authenticated caller.
pub struct SearchHandler {
    coordinator: Arc<QueryCoordinator>,
}

impl SearchHandler {
    pub fn new(coordinator: Arc<QueryCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Handle one search request.
    ///
    /// `tenant` is the identity resolved by the authentication layer; the
    /// body can never widen it. An empty body searches with defaults.
    pub async fn handle(
        &self,
        ctx: &RequestContext,
        tenant: Option<&str>,
        body: &str,
    ) -> ApiResponse {
        async {
            match self.process(ctx, tenant, body).await {
                Ok(response) => match serde_json::to_string(&response) {
                    Ok(body) => ApiResponse::json(200, body),
                    Err(e) => {
                        error!(error = %e, "Failed to serialize search response");
                        ApiResponse::json(500, json!({ "error": "Internal error" }).to_string())
                    }
                },
                Err(err) => {
                    if err.is_retryable() {
                        error!(error = %err, "Search failed");
                    } else {
                        warn!(error = %err, "Rejected search");
                    }
                    ApiResponse::error(&err)
                }
            }
        }
        .instrument(ctx.span().clone())
        .await
    }

    async fn process(
        &self,
        ctx: &RequestContext,
        tenant: Option<&str>,
        body: &str,
    ) -> Result<SearchResponse, ServiceError> {
        let tenant_id = TenantGuard::authorize(tenant)?;
        ctx.record_tenant(&tenant_id);

        let request: QueryRequest = if body.trim().is_empty() {
            QueryRequest::default()
        } else {
            serde_json::from_str(body)
                .map_err(|e| ServiceError::invalid_input(format!("Invalid request body: {}", e)))?
        };

        let response = self
            .coordinator
            .search(
                tenant_id.as_str(),
                &request.query,
                request.filters,
                request.page,
                request.page_size,
            )
            .await?;

        info!(
            total = response.total,
            returned = response.items.len(),
            page = response.page,
            "Search handled"
        );
        Ok(response)
    }
}
