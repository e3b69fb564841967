// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed-rule page chunker (C3).
//!
//! Chunking is deterministic and idempotent: the same page text under the
//! same [`ChunkParams`] always yields the same chunk spans, and therefore
//! (via [`compliance_core::Chunk::id_for`]) the same `chunk_id`s. Chunk
//! params participate in the run fingerprint, so a run replayed with
//! different params is a different run, never a silent reuse.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_core::{Chunk, Page};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Target chunk length and overlap, in characters. Both fold into the run
/// fingerprint via [`compliance_canon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkParams {
    /// Target number of characters per chunk.
    pub target_len: usize,
    /// Characters of overlap carried from the end of one chunk into the
    /// start of the next, for context continuity across a cut.
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_len: 800,
            overlap: 80,
        }
    }
}

/// Split one page's text into an ordered sequence of [`Chunk`]s.
///
/// Pages with empty text produce zero chunks — there is no such thing as
/// an empty-text chunk, since the evidence-gating invariant requires every
/// cited chunk to have non-empty text.
pub fn chunk_page(page: &Page, params: &ChunkParams) -> Vec<Chunk> {
    let target_len = params.target_len.max(1);
    let overlap = params.overlap.min(target_len.saturating_sub(1));

    let chars: Vec<char> = page.text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let len = chars.len();

    loop {
        let end = (start + target_len).min(len);
        let text: String = chars[start..end].iter().collect();
        let chunk_id = Chunk::id_for(&page.doc_hash, page.page_number, start, end);
        let token_count = text.split_whitespace().count();
        chunks.push(Chunk {
            chunk_id,
            doc_hash: page.doc_hash.clone(),
            page_number: page.page_number,
            start_offset: start,
            end_offset: end,
            text,
            token_count,
            embedding: None,
        });

        if end == len {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Chunk every page in `pages`, in page order, concatenating each page's
/// chunks in offset order.
pub fn chunk_pages(pages: &[Page], params: &ChunkParams) -> Vec<Chunk> {
    let mut out = Vec::new();
    for page in pages {
        out.extend(chunk_page(page, params));
    }
    out
}
