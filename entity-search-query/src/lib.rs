//! # Entity Search Query
//!
//! Read side of the entity search service. The [`QueryCoordinator`] turns a
//! validated search into a tenant-scoped store query; the [`SearchHandler`]
//! wraps it for JSON requests carrying the caller's tenant identity.

pub mod coordinator;
pub mod handler;

pub use coordinator::{QueryCoordinator, QueryPolicy};
pub use handler::{ApiResponse, SearchHandler};
