// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hybrid lexical/vector retriever (C4).
//!
//! Combines a BM25-style lexical score with cosine similarity over dense
//! embeddings, weighted per [`RetrievalParams`]. Ordering is always
//! deterministic: descending combined score, ties broken by ascending
//! `chunk_id` — never by the corpus's iteration/insertion order. When no
//! chunk in the candidate set carries an embedding, the retriever degrades
//! gracefully to lexical-only scoring rather than failing the run.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_core::{Chunk, RetrievalParams};
use std::cmp::Ordering;
use std::collections::HashMap;

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// One scored candidate, returned in final retrieval order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The scored chunk.
    pub chunk: Chunk,
    /// Combined score actually used for ranking.
    pub score: f64,
    /// Lexical (BM25) component.
    pub lexical_score: f64,
    /// Vector (cosine) component.
    pub vector_score: f64,
}

/// Result of a retrieval call, including the params actually applied —
/// distinct from the configured params when the vector arm degraded.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    /// Ranked results, length `<= params.top_k`.
    pub results: Vec<ScoredChunk>,
    /// Retrieval params actually used (weights renormalized on degrade).
    pub applied_params: RetrievalParams,
    /// `true` if no candidate chunk carried an embedding and the vector
    /// arm was dropped.
    pub vector_degraded: bool,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn bm25_scores(candidates: &[&Chunk], query_terms: &[String]) -> Vec<f64> {
    let n = candidates.len() as f64;
    if n == 0.0 {
        return Vec::new();
    }

    let doc_tokens: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.text)).collect();
    let doc_lens: Vec<f64> = doc_tokens.iter().map(|t| t.len() as f64).collect();
    let avg_len = doc_lens.iter().sum::<f64>() / n;

    let mut df: HashMap<&str, usize> = HashMap::new();
    for term in query_terms {
        let count = doc_tokens
            .iter()
            .filter(|tokens| tokens.iter().any(|t| t == term))
            .count();
        df.insert(term.as_str(), count);
    }

    doc_tokens
        .iter()
        .zip(doc_lens.iter())
        .map(|(tokens, &doc_len)| {
            let mut term_freq: HashMap<&str, usize> = HashMap::new();
            for t in tokens {
                *term_freq.entry(t.as_str()).or_insert(0) += 1;
            }
            query_terms
                .iter()
                .map(|term| {
                    let tf = *term_freq.get(term.as_str()).unwrap_or(&0) as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let docf = *df.get(term.as_str()).unwrap_or(&0) as f64;
                    let idf = ((n - docf + 0.5) / (docf + 0.5) + 1.0).ln();
                    let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len.max(1.0));
                    idf * (tf * (BM25_K1 + 1.0)) / denom.max(f64::EPSILON)
                })
                .sum()
        })
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Rank `candidates` against `query_text` (and optionally `query_embedding`),
/// returning at most `params.top_k` results in deterministic order.
pub fn retrieve(
    candidates: &[Chunk],
    query_text: &str,
    query_embedding: Option<&[f32]>,
    params: &RetrievalParams,
) -> RetrievalOutcome {
    let refs: Vec<&Chunk> = candidates.iter().collect();
    let query_terms = tokenize(query_text);
    let lexical = bm25_scores(&refs, &query_terms);

    let vector_available =
        query_embedding.is_some() && candidates.iter().any(|c| c.embedding.is_some());

    let (lexical_weight, vector_weight) = if vector_available {
        (params.lexical_weight, params.vector_weight)
    } else {
        (1.0, 0.0)
    };

    let mut scored: Vec<ScoredChunk> = candidates
        .iter()
        .zip(lexical.iter())
        .map(|(chunk, &lex)| {
            let vec_score = match (query_embedding, &chunk.embedding) {
                (Some(q), Some(e)) => cosine(q, e),
                _ => 0.0,
            };
            ScoredChunk {
                chunk: chunk.clone(),
                score: lexical_weight * lex + vector_weight * vec_score,
                lexical_score: lex,
                vector_score: vec_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    scored.truncate(params.top_k as usize);

    let mut applied = params.clone();
    if !vector_available {
        applied.lexical_weight = 1.0;
        applied.vector_weight = 0.0;
    }

    RetrievalOutcome {
        results: scored,
        applied_params: applied,
        vector_degraded: !vector_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_hash: "doc".to_string(),
            page_number: 1,
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            embedding,
        }
    }

    #[test]
    fn ranks_lexically_relevant_chunk_higher() {
        let chunks = vec![
            chunk("b", "irrelevant filler text about birds", None),
            chunk("a", "scope 1 emissions disclosure totals", None),
            chunk("c", "more filler about weather patterns", None),
        ];
        let outcome = retrieve(
            &chunks,
            "scope 1 emissions",
            None,
            &RetrievalParams::default(),
        );
        assert_eq!(outcome.results[0].chunk.chunk_id, "a");
    }

    #[test]
    fn ties_break_on_ascending_chunk_id() {
        let chunks = vec![
            chunk("z", "identical text here", None),
            chunk("a", "identical text here", None),
        ];
        let outcome = retrieve(
            &chunks,
            "identical text",
            None,
            &RetrievalParams::default(),
        );
        assert_eq!(outcome.results[0].chunk.chunk_id, "a");
        assert_eq!(outcome.results[1].chunk.chunk_id, "z");
    }

    #[test]
    fn degrades_gracefully_without_embeddings() {
        let chunks = vec![chunk("a", "scope 1 emissions", None)];
        let outcome = retrieve(
            &chunks,
            "scope 1",
            Some(&[1.0, 0.0]),
            &RetrievalParams::default(),
        );
        assert!(outcome.vector_degraded);
        assert_eq!(outcome.applied_params.vector_weight, 0.0);
    }

    #[test]
    fn uses_vector_score_when_embeddings_present() {
        let chunks = vec![
            chunk("a", "unrelated text", Some(vec![1.0, 0.0])),
            chunk("b", "unrelated text", Some(vec![0.0, 1.0])),
        ];
        let outcome = retrieve(
            &chunks,
            "unrelated text",
            Some(&[1.0, 0.0]),
            &RetrievalParams {
                lexical_weight: 0.0,
                vector_weight: 1.0,
                ..RetrievalParams::default()
            },
        );
        assert!(!outcome.vector_degraded);
        assert_eq!(outcome.results[0].chunk.chunk_id, "a");
    }

    #[test]
    fn respects_top_k() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| chunk(&format!("c{i:02}"), "scope 1 emissions", None))
            .collect();
        let params = RetrievalParams {
            top_k: 5,
            ..RetrievalParams::default()
        };
        let outcome = retrieve(&chunks, "scope 1", None, &params);
        assert_eq!(outcome.results.len(), 5);
    }

    #[test]
    fn retrieval_is_deterministic_across_calls() {
        let chunks = vec![
            chunk("a", "scope 1 emissions", None),
            chunk("b", "scope 2 emissions", None),
            chunk("c", "scope 3 emissions", None),
        ];
        let params = RetrievalParams::default();
        let first = retrieve(&chunks, "scope emissions", None, &params);
        let second = retrieve(&chunks, "scope emissions", None, &params);
        let ids_a: Vec<&str> = first.results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = second.results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn empty_candidate_set_yields_empty_results() {
        let outcome = retrieve(&[], "anything", None, &RetrievalParams::default());
        assert!(outcome.results.is_empty());
    }
}
