//! Tokenization shared by both backends.
//!
//! The OpenSearch `search_text` analyzer splits on the same boundaries, so a
//! query tokenized here lines up with the indexed terms.

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
