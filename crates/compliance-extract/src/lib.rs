// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic, page-ordered text extraction (C2).
//!
//! Extraction is a pure function of `(bytes, content_type)`: the same
//! document always yields the same ordered [`Page`](compliance_core::Page)
//! sequence, under the same stamped `parser_version`. Non-text pages are
//! represented with empty text, never omitted, so downstream chunking can
//! rely on a contiguous `1..=page_count` range.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_core::{DocHash, Page};
use compliance_error::{ComplianceError, ErrorKind, Result};

/// Version stamped onto every [`Page`] this crate produces. Bump whenever
/// the extraction or cleaning rules change, since it participates in the
/// run fingerprint.
pub const PARSER_VERSION: &str = "extract-v1";

/// Extracts an ordered page sequence from document bytes.
pub trait Extractor {
    /// Extract pages from `bytes`, declared as `content_type`.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Validation` with reason `UNSUPPORTED_FORMAT` if
    /// `content_type` is not one this extractor recognizes.
    fn extract(&self, doc_hash: &DocHash, bytes: &[u8], content_type: &str) -> Result<Vec<Page>>;
}

/// The pipeline's sole [`Extractor`] implementation: PDF via `pdf-extract`,
/// plain text and Markdown passed through the same cleaning rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicExtractor;

impl Extractor for DeterministicExtractor {
    fn extract(&self, doc_hash: &DocHash, bytes: &[u8], content_type: &str) -> Result<Vec<Page>> {
        match content_type {
            "application/pdf" => extract_pdf(doc_hash, bytes),
            "text/plain" | "text/markdown" => extract_plain_text(doc_hash, bytes),
            other => Err(ComplianceError::new(
                ErrorKind::Validation,
                "unsupported document content type",
            )
            .with_context("reason_code", "UNSUPPORTED_FORMAT")
            .with_context("content_type", other)),
        }
    }
}

/// `pdf-extract` joins page text with form-feed (`\x0c`) boundaries; this is
/// the same convention used for plain-text documents so both paths share
/// one splitting routine and one test surface.
fn extract_pdf(doc_hash: &DocHash, bytes: &[u8]) -> Result<Vec<Page>> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        ComplianceError::new(ErrorKind::Validation, "failed to extract text from PDF")
            .with_context("reason_code", "UNSUPPORTED_FORMAT")
            .with_source_display(e)
    })?;
    Ok(split_pages(doc_hash, &text))
}

fn extract_plain_text(doc_hash: &DocHash, bytes: &[u8]) -> Result<Vec<Page>> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    Ok(split_pages(doc_hash, &text))
}

fn split_pages(doc_hash: &DocHash, text: &str) -> Vec<Page> {
    let raw_pages: Vec<&str> = text.split('\x0c').collect();
    raw_pages
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let cleaned = clean_page_text(raw);
            Page {
                doc_hash: doc_hash.clone(),
                page_number: (idx + 1) as u32,
                char_count: cleaned.chars().count(),
                text: cleaned,
                parser_version: PARSER_VERSION.to_string(),
            }
        })
        .collect()
}

/// Deterministic whitespace normalization: trims each line, collapses
/// runs of 3+ blank lines to one blank line, trims the page as a whole.
/// Never drops lines based on heuristics (all-caps, short lines, etc.) —
/// those are lossy and would break evidence citation.
fn clean_page_text(raw: &str) -> String {
    let mut out = String::new();
    let mut blank_run = 0;
    for line in raw.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run <= 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(trimmed);
            out.push('\n');
        }
    }
    out.trim().to_string()
}

trait ComplianceErrorDisplayExt {
    fn with_source_display(self, err: impl std::fmt::Display) -> Self;
}

impl ComplianceErrorDisplayExt for ComplianceError {
    fn with_source_display(self, err: impl std::fmt::Display) -> Self {
        self.with_context("source", err.to_string())
    }
}
