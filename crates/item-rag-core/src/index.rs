//! In-memory BM25 retrieval index.
//!
//! The index is built fresh for each query from the documents a store search
//! returned, so relevance is computed over that small ad-hoc corpus, not the
//! whole store. Nothing is shared between requests.
//!
//! # Scoring
//!
//! Okapi BM25 with a non-negative IDF:
//!
//! ```text
//! idf(t)      = ln(1 + (N - n(t) + 0.5) / (n(t) + 0.5))
//! score(d, q) = Σ_t∈q idf(t) · tf(t,d)·(k1 + 1) / (tf(t,d) + k1·(1 - b + b·|d|/avgdl))
//! ```
//!
//! Results are sorted by score descending; equal scores keep insertion order.
//! Zero-score documents are returned after the positive ones, so a document
//! that matched the store's substring search but not a whole token still
//! reaches the prompt.
//!
//! # Example
//!
//! ```rust
//! use item_rag_core::index::{Bm25Index, Bm25Params};
//! use item_rag_core::models::RetrievedDocument;
//!
//! let mut index = Bm25Index::new(Bm25Params::default());
//! index.index(vec![
//!     RetrievedDocument { id: "a".into(), content: "blue gadget".into() },
//!     RetrievedDocument { id: "b".into(), content: "red widget".into() },
//! ]);
//! let ranked = index.rank("widget", 10);
//! assert_eq!(ranked[0].document.id, "b");
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::RetrievedDocument;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalization strength in `[0, 1]`.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// A ranked document with its BM25 score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: RetrievedDocument,
    pub score: f64,
}

struct IndexedDoc {
    document: RetrievedDocument,
    term_freqs: HashMap<String, usize>,
    len: usize,
}

/// Per-request lexical index over [`RetrievedDocument`]s.
pub struct Bm25Index {
    params: Bm25Params,
    docs: Vec<IndexedDoc>,
    doc_freqs: HashMap<String, usize>,
    total_len: usize,
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            docs: Vec::new(),
            doc_freqs: HashMap::new(),
            total_len: 0,
        }
    }

    /// Adds documents to the corpus, after any already indexed.
    pub fn index<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = RetrievedDocument>,
    {
        for document in documents {
            let tokens = tokenize(&document.content);
            let mut term_freqs: HashMap<String, usize> = HashMap::new();
            for token in &tokens {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            self.total_len += tokens.len();
            self.docs.push(IndexedDoc {
                document,
                term_freqs,
                len: tokens.len(),
            });
        }
    }

    /// Returns at most `top_k` documents ordered by relevance to `query`.
    pub fn rank(&self, query: &str, top_k: usize) -> Vec<ScoredDocument> {
        if top_k == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let query_terms = tokenize(query);
        let n = self.docs.len() as f64;
        let avgdl = self.total_len as f64 / n;

        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(pos, doc)| {
                let score = query_terms
                    .iter()
                    .map(|term| self.term_score(term, doc, n, avgdl))
                    .sum();
                (pos, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(pos, score)| ScoredDocument {
                document: self.docs[pos].document.clone(),
                score,
            })
            .collect()
    }

    fn term_score(&self, term: &str, doc: &IndexedDoc, n: f64, avgdl: f64) -> f64 {
        let tf = match doc.term_freqs.get(term) {
            Some(&tf) if tf > 0 => tf as f64,
            _ => return 0.0,
        };
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f64;
        let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
        let Bm25Params { k1, b } = self.params;
        let norm = 1.0 - b + b * doc.len as f64 / avgdl;
        idf * tf * (k1 + 1.0) / (tf + k1 * norm)
    }
}

/// Lowercases and splits on non-alphanumeric characters, dropping
/// single-character tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}
