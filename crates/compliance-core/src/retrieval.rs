// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retrieval parameters, replayable per datapoint (§4.4, §4.11).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The retrieval configuration actually used for one datapoint's query.
/// Recorded verbatim into the per-datapoint diagnostic and folded into the
/// run hash, so a cached or replayed run can reproduce the exact retrieval
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetrievalParams {
    /// Number of chunks requested.
    pub top_k: u32,
    /// Weight applied to the lexical (token-match) score.
    pub lexical_weight: f64,
    /// Weight applied to the vector (cosine) score.
    pub vector_weight: f64,
    /// Lexical-scoring normalization mode, e.g. `"bm25"`.
    pub normalization_mode: String,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 8,
            lexical_weight: 0.5,
            vector_weight: 0.5,
            normalization_mode: "bm25".to_string(),
        }
    }
}
