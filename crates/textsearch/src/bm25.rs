//! BM25 scoring over the `bm25_docs` table.
//!
//! Deliberately depends on `vdb-storage` directly rather than routing through
//! `vdb-catalog`: the document store here is a flat `vector_id -> tokens`
//! dictionary with no Space/Version/Index structure of its own, so there is
//! nothing for the catalog layer to mediate.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use vdb_core::{InternalId, Result};

use crate::tokenizer::tokenize;

const K1: f32 = 1.5;
const B: f32 = 0.75;

/// A scored hit from [`search_with_ids`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Hit {
    pub vector_id: InternalId,
    pub score: f32,
}

fn serialize_term_freqs(tokens: &[String]) -> (String, usize) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let serialised = pairs
        .iter()
        .map(|(t, f)| format!("{t}:{f}"))
        .collect::<Vec<_>>()
        .join(" ");
    (serialised, tokens.len())
}

fn deserialize_term_freqs(serialised: &str) -> HashMap<String, usize> {
    serialised
        .split_whitespace()
        .filter_map(|pair| {
            let (term, freq) = pair.rsplit_once(':')?;
            freq.parse::<usize>().ok().map(|f| (term.to_string(), f))
        })
        .collect()
}

/// Store `doc`'s tokenized term frequencies for `vector_id`, replacing any
/// prior document (upsert, matching the catalog's last-writer-wins policy).
pub fn add_document(tx: &Transaction, vector_id: InternalId, doc: &str) -> Result<()> {
    let tokens = tokenize(doc);
    let (tokens_serialised, doc_length) = serialize_term_freqs(&tokens);
    tx.execute(
        "INSERT INTO bm25_docs (vector_id, doc, doc_length, tokens_serialised) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(vector_id) DO UPDATE SET doc = excluded.doc, doc_length = excluded.doc_length,
             tokens_serialised = excluded.tokens_serialised",
        params![vector_id, doc, doc_length as i64, tokens_serialised],
    )?;
    Ok(())
}

/// Remove `vector_id`'s document, if any.
pub fn remove_document(tx: &Transaction, vector_id: InternalId) -> Result<()> {
    tx.execute("DELETE FROM bm25_docs WHERE vector_id = ?1", [vector_id])?;
    Ok(())
}

/// Fetch the raw document text for `vector_id`, if indexed.
pub fn get_document(conn: &Connection, vector_id: InternalId) -> Result<Option<String>> {
    conn.query_row(
        "SELECT doc FROM bm25_docs WHERE vector_id = ?1",
        [vector_id],
        |r| r.get(0),
    )
    .optional()
    .map_err(Into::into)
}

struct WorkingDoc {
    vector_id: InternalId,
    doc_length: f32,
    term_freqs: HashMap<String, usize>,
}

/// Score every `vector_id` in `vector_ids` against `query` (tokenized with the
/// same pipeline as indexing), restricted to document statistics within this
/// working set — not the whole corpus.
///
/// Results are sorted descending by score, ties broken by ascending
/// `vector_id`. A `vector_id` with no indexed document scores `0.0`.
pub fn search_with_ids(conn: &Connection, vector_ids: &[InternalId], query: &str) -> Result<Vec<Bm25Hit>> {
    let query_terms = tokenize(query);
    if vector_ids.is_empty() || query_terms.is_empty() {
        return Ok(vector_ids
            .iter()
            .map(|&vector_id| Bm25Hit { vector_id, score: 0.0 })
            .collect());
    }

    let mut docs = Vec::with_capacity(vector_ids.len());
    for &vector_id in vector_ids {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT doc_length, tokens_serialised FROM bm25_docs WHERE vector_id = ?1",
                [vector_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match row {
            Some((doc_length, serialised)) => docs.push(WorkingDoc {
                vector_id,
                doc_length: doc_length as f32,
                term_freqs: deserialize_term_freqs(&serialised),
            }),
            None => docs.push(WorkingDoc {
                vector_id,
                doc_length: 0.0,
                term_freqs: HashMap::new(),
            }),
        }
    }

    let n = docs.len() as f32;
    let avg_doc_len = if docs.is_empty() {
        0.0
    } else {
        docs.iter().map(|d| d.doc_length).sum::<f32>() / n
    };

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for term in &query_terms {
        let df = docs.iter().filter(|d| d.term_freqs.contains_key(term)).count();
        doc_freq.insert(term.as_str(), df);
    }

    let mut hits: Vec<Bm25Hit> = docs
        .iter()
        .map(|doc| {
            let mut score = 0.0f32;
            for term in &query_terms {
                let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f32;
                if tf == 0.0 {
                    continue;
                }
                let df = *doc_freq.get(term.as_str()).unwrap_or(&0) as f32;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let norm = if avg_doc_len > 0.0 {
                    1.0 - B + B * doc.doc_length / avg_doc_len
                } else {
                    1.0 - B
                };
                score += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
            Bm25Hit {
                vector_id: doc.vector_id,
                score,
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.vector_id.cmp(&b.vector_id))
    });
    Ok(hits)
}
