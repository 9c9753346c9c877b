//! # Entity Search
//!
//! Main library for the multi-tenant entity search service.
//!
//! This crate provides the configuration, dependency wiring and the
//! line-oriented service loop behind the `entity-search` binary.

pub mod config;
pub mod service;

pub use config::{Backend, Dependencies, ServiceConfig};
pub use service::Service;

use thiserror::Error;

/// Errors that can occur during service initialization or execution.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Index store error.
    #[error("Store error: {0}")]
    StoreError(#[from] entity_search_repository::SearchIndexError),

    /// Coordinator error.
    #[error(transparent)]
    ServiceError(#[from] entity_search_shared::ServiceError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
