//! # Entity Search Shared
//!
//! Shared types and data structures for the multi-tenant entity search
//! service: the document model, the typed payload and filter mappings,
//! change events, query requests and responses, the error taxonomy, and the
//! tenant isolation guard applied at every entry point.

pub mod context;
pub mod document;
pub mod errors;
pub mod event;
pub mod filters;
pub mod guard;
pub mod payload;
pub mod query;

pub use context::RequestContext;
pub use document::{DocumentKey, EntityDocument};
pub use errors::ServiceError;
pub use event::{ChangeEvent, ChangeEventKind};
pub use filters::{FilterCondition, FilterSet, RangeBounds};
pub use guard::{TenantGuard, TenantId};
pub use payload::{FieldValue, Payload};
pub use query::{QueryRequest, SearchHit, SearchResponse};
