//! Service settings read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use entity_search_ingest::{IndexPolicy, ReceiverConfig};
use entity_search_query::QueryPolicy;
use entity_search_repository::config::DEFAULT_OPENSEARCH_URL;
use entity_search_repository::opensearch::DEFAULT_INDEX_ALIAS;
use entity_search_repository::{IndexConfig, OpenSearchConfig};

use crate::AppError;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TOMBSTONE_RETENTION_SECS: u64 = 86_400;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 300;

/// Which index store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenSearch,
    /// Process-local store; contents are lost on exit.
    Memory,
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opensearch" => Ok(Self::OpenSearch),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::config(format!(
                "SEARCH_BACKEND must be 'opensearch' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub backend: Backend,
    pub opensearch: OpenSearchConfig,
    pub index_policy: IndexPolicy,
    pub query_policy: QueryPolicy,
    pub receiver: ReceiverConfig,
    /// Time between tombstone purge passes.
    pub purge_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::OpenSearch,
            opensearch: OpenSearchConfig::default(),
            index_policy: IndexPolicy::default(),
            query_policy: QueryPolicy::default(),
            receiver: ReceiverConfig::default(),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SEARCH_BACKEND`: `opensearch` or `memory` (default: opensearch)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_ALIAS`: Index alias (default: tenant_entities)
    /// - `SEARCH_INDEX_VERSION`: Physical index version (default: 0)
    /// - `STORE_TIMEOUT_MS`: Store request timeout (default: 5000)
    /// - `TOMBSTONE_RETENTION_SECS`: Tombstone retention (default: 86400)
    /// - `PURGE_INTERVAL_SECS`: Time between purge passes (default: 300)
    /// - `MAX_PAGE_SIZE`: Largest accepted page size (default: 100)
    /// - `MAX_BATCH_SIZE`: Largest accepted event batch (default: 1000)
    ///
    /// # Returns
    ///
    /// * `Ok(ServiceConfig)` - The parsed configuration
    /// * `Err(AppError)` - If a variable holds an invalid value
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend = match lookup("SEARCH_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };

        let url = lookup("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string());
        let alias = lookup("SEARCH_INDEX_ALIAS").unwrap_or_else(|| DEFAULT_INDEX_ALIAS.to_string());
        if alias.trim().is_empty() {
            return Err(AppError::config("SEARCH_INDEX_ALIAS must not be empty"));
        }
        let index_version: u32 = parse_var(&lookup, "SEARCH_INDEX_VERSION", 0)?;
        let timeout_ms: u64 = parse_var(&lookup, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;

        let retention_secs: u64 =
            parse_var(&lookup, "TOMBSTONE_RETENTION_SECS", DEFAULT_TOMBSTONE_RETENTION_SECS)?;
        let purge_interval_secs: u64 =
            parse_var(&lookup, "PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS)?;
        if purge_interval_secs == 0 {
            return Err(AppError::config("PURGE_INTERVAL_SECS must be greater than 0"));
        }

        let max_page_size: i64 =
            parse_var(&lookup, "MAX_PAGE_SIZE", defaults.query_policy.max_page_size)?;
        if max_page_size < 1 || max_page_size > defaults.query_policy.max_result_window {
            return Err(AppError::config(format!(
                "MAX_PAGE_SIZE must be between 1 and {}",
                defaults.query_policy.max_result_window
            )));
        }
        let max_batch_size: usize =
            parse_var(&lookup, "MAX_BATCH_SIZE", defaults.receiver.max_batch_size)?;
        if max_batch_size == 0 {
            return Err(AppError::config("MAX_BATCH_SIZE must be greater than 0"));
        }

        Ok(Self {
            backend,
            opensearch: OpenSearchConfig {
                url,
                request_timeout: Duration::from_millis(timeout_ms),
                index: IndexConfig::new(alias, index_version),
            },
            index_policy: IndexPolicy {
                tombstone_retention: Duration::from_secs(retention_secs),
                ..defaults.index_policy
            },
            query_policy: QueryPolicy {
                max_page_size,
                ..defaults.query_policy
            },
            receiver: ReceiverConfig { max_batch_size },
            purge_interval: Duration::from_secs(purge_interval_secs),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
