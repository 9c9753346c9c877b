//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the tenant entity index.

use serde_json::{json, Value};

/// Default alias the service reads and writes through.
pub const DEFAULT_INDEX_ALIAS: &str = "tenant_entities";

/// Catch-all text field every payload string is copied into.
pub const SEARCH_TEXT_FIELD: &str = "search_text";

/// Analyzer of [`SEARCH_TEXT_FIELD`]: lowercase runs of letters and digits.
const SEARCH_TEXT_ANALYZER: &str = "entity_text";

/// Alias and version of the physical index.
///
/// The physical index is named `{alias}_v{version}`; the service only ever
/// addresses the alias, so a reindex can swap versions underneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub alias: String,
    pub version: u32,
}

impl IndexConfig {
    pub fn new(alias: impl Into<String>, version: u32) -> Self {
        Self {
            alias: alias.into(),
            version,
        }
    }

    /// Name of the physical index behind the alias.
    pub fn index_name(&self) -> String {
        format!("{}_v{}", self.alias, self.version)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_ALIAS, 0)
    }
}

/// Get the index settings and mappings for the tenant entity index.
///
/// The configuration includes:
/// - **Keyword fields**: `tenant_id` and `entity_id` for scoping and exact lookups
/// - **Dynamic payload mapping**: string payload fields become `text` with a
///   `raw` keyword subfield for exact filters, and are copied into
///   `search_text` for free text
/// - **Search text**: one field analyzed into the same tokens the in-memory
///   store produces, so each query token can be matched across all fields
/// - **Tombstone fields**: `deleted` and `deleted_at` for exclusion and purging
pub fn get_index_settings(alias: &str) -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "analyzer": {
                    SEARCH_TEXT_ANALYZER: {
                        "type": "pattern",
                        "pattern": "[^\\p{L}\\p{N}]+",
                        "lowercase": true
                    }
                }
            }
        },
        "aliases": {
            alias: {}
        },
        "mappings": {
            "dynamic_templates": [
                {
                    "payload_strings": {
                        "path_match": "payload.*",
                        "match_mapping_type": "string",
                        "mapping": {
                            "type": "text",
                            "copy_to": SEARCH_TEXT_FIELD,
                            "fields": {
                                "raw": {
                                    "type": "keyword",
                                    "ignore_above": 256
                                }
                            }
                        }
                    }
                }
            ],
            "properties": {
                "tenant_id": {
                    "type": "keyword"
                },
                "entity_id": {
                    "type": "keyword"
                },
                "version": {
                    "type": "long"
                },
                "deleted": {
                    "type": "boolean"
                },
                "updated_at": {
                    "type": "date"
                },
                "deleted_at": {
                    "type": "date"
                },
                "payload": {
                    "type": "object",
                    "dynamic": true
                },
                SEARCH_TEXT_FIELD: {
                    "type": "text",
                    "analyzer": SEARCH_TEXT_ANALYZER
                }
            }
        }
    })
}
