// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document, page, and chunk records (data model §3: Document, Page, Chunk).

use crate::{ChunkId, DocHash};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable, content-addressed document. Identified by `doc_hash =
/// SHA-256(bytes)`. Never mutated after ingest; the only lifecycle events
/// are creation and (while unreferenced) deletion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    /// `SHA-256(bytes)`, hex-encoded.
    pub doc_hash: DocHash,
    /// Size of the stored bytes, in bytes.
    pub size: u64,
    /// MIME content type as declared at upload time.
    pub content_type: String,
    /// Parser version of the most recent successful extraction, if any.
    pub parser_version: Option<String>,
}

/// Grants a company (within a tenant) retrieval access to a document.
/// A document may be linked to many companies; retrieval is always
/// company-scoped, never tenant-wide.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct CompanyDocumentLink {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Company the link grants access to.
    pub company_id: Uuid,
    /// Linked document.
    pub doc_hash: DocHash,
}

/// One page of extracted text. Unique by `(doc_hash, page_number)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    /// Owning document.
    pub doc_hash: DocHash,
    /// 1-based page number.
    pub page_number: u32,
    /// Extracted text. Empty (not omitted) for non-text pages.
    pub text: String,
    /// `text.chars().count()`, stamped at extraction time.
    pub char_count: usize,
    /// Extractor version that produced this page.
    pub parser_version: String,
}

/// A fixed-rule substring of a page with a content-derived stable ID.
///
/// Ordering key for any query that feeds a downstream artifact:
/// `(doc_hash, page_number, start_offset)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Chunk {
    /// `SHA-256(doc_hash || ':' || page_number || ':' || start_offset || ':' || end_offset)`.
    pub chunk_id: ChunkId,
    /// Owning document.
    pub doc_hash: DocHash,
    /// Page this chunk was cut from.
    pub page_number: u32,
    /// Byte offset (into the page's char sequence) where the chunk starts, inclusive.
    pub start_offset: usize,
    /// Offset where the chunk ends, exclusive.
    pub end_offset: usize,
    /// Chunk text.
    pub text: String,
    /// Approximate token count (whitespace-delimited).
    pub token_count: usize,
    /// Dense embedding vector, if one was computed for this chunk.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Compute the stable, content-derived chunk ID for a given span.
    ///
    /// # Examples
    ///
    /// ```
    /// use compliance_core::Chunk;
    /// let id1 = Chunk::id_for("ab12", 1, 0, 100);
    /// let id2 = Chunk::id_for("ab12", 1, 0, 100);
    /// assert_eq!(id1, id2);
    /// assert_eq!(id1.len(), 64);
    /// ```
    pub fn id_for(doc_hash: &str, page_number: u32, start_offset: usize, end_offset: usize) -> ChunkId {
        let preimage = format!("{doc_hash}:{page_number}:{start_offset}:{end_offset}");
        compliance_canon::sha256_hex(preimage.as_bytes())
    }

    /// Ordering key used for every query whose output feeds a downstream
    /// artifact: `(doc_hash, page_number, start_offset)`.
    pub fn ordering_key(&self) -> (&str, u32, usize) {
        (&self.doc_hash, self.page_number, self.start_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic_function_of_span() {
        let a = Chunk::id_for("deadbeef", 2, 10, 210);
        let b = Chunk::id_for("deadbeef", 2, 10, 210);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_changes_with_any_component() {
        let base = Chunk::id_for("deadbeef", 2, 10, 210);
        assert_ne!(base, Chunk::id_for("deadbeef", 3, 10, 210));
        assert_ne!(base, Chunk::id_for("deadbeef", 2, 11, 210));
        assert_ne!(base, Chunk::id_for("deadbeef", 2, 10, 211));
        assert_ne!(base, Chunk::id_for("cafebabe", 2, 10, 210));
    }

    #[test]
    fn ordering_key_sorts_by_doc_page_offset() {
        let mut chunks = vec![
            Chunk {
                chunk_id: "c".into(),
                doc_hash: "x".into(),
                page_number: 2,
                start_offset: 0,
                end_offset: 10,
                text: String::new(),
                token_count: 0,
                embedding: None,
            },
            Chunk {
                chunk_id: "a".into(),
                doc_hash: "x".into(),
                page_number: 1,
                start_offset: 50,
                end_offset: 60,
                text: String::new(),
                token_count: 0,
                embedding: None,
            },
            Chunk {
                chunk_id: "b".into(),
                doc_hash: "x".into(),
                page_number: 1,
                start_offset: 0,
                end_offset: 10,
                text: String::new(),
                token_count: 0,
                embedding: None,
            },
        ];
        chunks.sort_by(|l, r| l.ordering_key().cmp(&r.ordering_key()));
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
