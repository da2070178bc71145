//! Hybrid ANN + BM25 retrieval: request parsing, the metadata filter
//! grammar, and the rerank combiner, composed over `vdb-catalog` and
//! `vdb-textsearch`.

pub mod filter;
pub mod hybrid;
pub mod request;

pub use filter::{parse as parse_filter, Filter};
pub use hybrid::search;
pub use request::{ResultItem, SearchRequest, SparseInput};
