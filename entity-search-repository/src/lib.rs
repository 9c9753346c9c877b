//! # Entity Search Repository
//!
//! This crate provides the index store abstraction used by the coordinators
//! and two implementations of it: an in-memory store for tests and local
//! runs, and a concrete implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod text;
pub mod types;

pub use config::OpenSearchConfig;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchIndex;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use types::{ScoredDocument, StorePage, StoreQuery, WriteCondition, WriteOutcome};
