//! OpenSearch query builders.
//!
//! This module provides functions to build OpenSearch queries from tenant
//! scoped store queries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::index_config::SEARCH_TEXT_FIELD;
use crate::types::StoreQuery;
use entity_search_shared::{FieldValue, FilterCondition, RangeBounds};

/// Build an OpenSearch search body from a StoreQuery.
///
/// The query builder handles:
/// - Mandatory tenant scoping and tombstone exclusion as `filter` clauses
/// - One prefix clause per query token over the `search_text` field
/// - Exact, any-of and range filters on payload fields
/// - Relevance ordering for text queries, recency ordering otherwise
pub fn build_search_query(query: &StoreQuery) -> Value {
    let mut filter = vec![
        json!({ "term": { "tenant_id": query.tenant_id.as_str() } }),
        json!({ "term": { "deleted": false } }),
    ];
    filter.extend(
        query
            .filters
            .iter()
            .map(|(field, condition)| build_filter_clause(field, condition)),
    );

    let (must, sort) = match query.text_tokens() {
        Some(tokens) => (
            build_text_clauses(&tokens),
            json!(["_score", { "updated_at": "desc" }, { "entity_id": "asc" }]),
        ),
        None => (
            Vec::new(),
            json!([{ "updated_at": "desc" }, { "entity_id": "asc" }]),
        ),
    };

    json!({
        "from": query.offset,
        "size": query.limit,
        "track_total_hits": true,
        "query": {
            "bool": {
                "filter": filter,
                "must": must
            }
        },
        "sort": sort
    })
}

/// Build the delete-by-query body that purges expired tombstones.
pub fn build_purge_query(deleted_before: DateTime<Utc>) -> Value {
    let cutoff = deleted_before.to_rfc3339_opts(SecondsFormat::Millis, true);
    json!({
        "query": {
            "bool": {
                "filter": [
                    { "term": { "deleted": true } },
                    { "range": { "deleted_at": { "lt": cutoff } } }
                ]
            }
        }
    })
}

/// Free-text clauses: each token must be a prefix of some indexed token.
///
/// Whole-token hits are boosted over prefix hits. Text without tokens
/// matches nothing.
fn build_text_clauses(tokens: &[String]) -> Vec<Value> {
    if tokens.is_empty() {
        return vec![json!({ "match_none": {} })];
    }
    tokens
        .iter()
        .map(|token| {
            json!({
                "bool": {
                    "should": [
                        { "term": { SEARCH_TEXT_FIELD: { "value": token, "boost": 2.0 } } },
                        { "prefix": { SEARCH_TEXT_FIELD: { "value": token } } }
                    ],
                    "minimum_should_match": 1
                }
            })
        })
        .collect()
}

/// Text values are matched against the `raw` keyword subfield.
fn field_path(field: &str, value: &FieldValue) -> String {
    match value {
        FieldValue::Text(_) => format!("payload.{}.raw", field),
        _ => format!("payload.{}", field),
    }
}

fn build_term_clause(field: &str, value: &FieldValue) -> Value {
    let path = field_path(field, value);
    json!({ "term": { path: value.to_json() } })
}

fn build_range_clause(field: &str, bounds: &RangeBounds) -> Value {
    let mut range = serde_json::Map::new();
    let mut path = format!("payload.{}", field);
    let bounds = [
        ("gt", &bounds.gt),
        ("gte", &bounds.gte),
        ("lt", &bounds.lt),
        ("lte", &bounds.lte),
    ];
    for (op, bound) in bounds {
        if let Some(bound) = bound {
            path = field_path(field, bound);
            range.insert(op.to_string(), bound.to_json());
        }
    }
    json!({ "range": { path: range } })
}

fn build_filter_clause(field: &str, condition: &FilterCondition) -> Value {
    match condition {
        FilterCondition::Exact(value) => build_term_clause(field, value),
        FilterCondition::AnyOf(values) => {
            let should: Vec<Value> = values
                .iter()
                .map(|value| build_term_clause(field, value))
                .collect();
            json!({
                "bool": {
                    "should": should,
                    "minimum_should_match": 1
                }
            })
        }
        FilterCondition::Range(bounds) => build_range_clause(field, bounds),
    }
}
