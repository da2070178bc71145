//! Shared tokenizer for BM25 indexing and querying.
//!
//! Lower-case, split on non-alphanumeric runs, drop empty tokens. Indexing
//! and querying must use the same pipeline or document frequencies drift.

/// Tokenize `text` into lower-cased alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
