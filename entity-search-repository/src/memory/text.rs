//! Text matching for the in-memory store.
//!
//! Mirrors the prefix-style matching of the OpenSearch query: every query
//! token must be a prefix of some token in the document's text fields.

use crate::text::tokenize;
use entity_search_shared::Payload;

/// Weight of a whole-token match.
const EXACT_TOKEN_WEIGHT: f64 = 2.0;

/// Weight of a prefix-only match.
const PREFIX_TOKEN_WEIGHT: f64 = 1.0;

/// Score a payload against query tokens.
///
/// Returns `None` when any query token has no match.
pub fn relevance(query_tokens: &[String], payload: &Payload) -> Option<f64> {
    let doc_tokens: Vec<String> = payload.text_values().flat_map(tokenize).collect();

    let mut score = 0.0;
    for query_token in query_tokens {
        let term_score: f64 = doc_tokens
            .iter()
            .map(|token| {
                if token == query_token {
                    EXACT_TOKEN_WEIGHT
                } else if token.starts_with(query_token.as_str()) {
                    PREFIX_TOKEN_WEIGHT
                } else {
                    0.0
                }
            })
            .sum();
        if term_score == 0.0 {
            return None;
        }
        score += term_score;
    }
    Some(score)
}
