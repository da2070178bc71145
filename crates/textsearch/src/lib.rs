//! BM25 token scoring over a bounded working set of catalog vector ids.
//!
//! Grounded on a lightweight BM25 scorer and tokenizer pattern, stripped of
//! title/recency boosts this system has no use for and pinned to fixed
//! `k1=1.5`, `b=0.75`.

pub mod bm25;
pub mod tokenizer;

pub use bm25::{add_document, get_document, remove_document, search_with_ids, Bm25Hit};
pub use tokenizer::tokenize;
