//! Request-scoped logging context.
//!
//! Handlers receive a [`RequestContext`] explicitly and run their work inside
//! its span, so every log line carries the request id and, once resolved,
//! the tenant.

use tracing::{field, info_span, Span};
use uuid::Uuid;

use crate::guard::TenantId;

/// Per-invocation context handed to every handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    span: Span,
}

impl RequestContext {
    /// Create a context with a fresh request id.
    pub fn new(operation: &'static str) -> Self {
        Self::with_request_id(operation, Uuid::new_v4())
    }

    /// Create a context for a request id assigned by the caller.
    pub fn with_request_id(operation: &'static str, request_id: Uuid) -> Self {
        let span = info_span!(
            "request",
            request_id = %request_id,
            operation = operation,
            tenant_id = field::Empty,
        );
        Self { request_id, span }
    }

    /// Derive a context for one item of a batch, nested under this request's span.
    pub fn child(&self, operation: &'static str) -> Self {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            parent: &self.span,
            "request",
            request_id = %request_id,
            operation = operation,
            tenant_id = field::Empty,
        );
        Self { request_id, span }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Attach the resolved tenant to the request span.
    pub fn record_tenant(&self, tenant_id: &TenantId) {
        self.span.record("tenant_id", tenant_id.as_str());
    }
}
