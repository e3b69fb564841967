// SPDX-License-Identifier: MIT OR Apache-2.0
//! Manifest and evidence-pack packaging (C12).
//!
//! Bundles a completed run's [`RunManifest`], compiled plan, coverage
//! matrix, assessments, cited evidence chunks, and the source document
//! bytes into a single zip archive. Byte-identical inputs always produce a
//! byte-identical archive: entries are written in lexicographic name
//! order, every JSON entry is canonicalized before writing, and zip entry
//! metadata (timestamp, unix permissions) is normalized rather than left
//! to the local clock.
//!
//! Every `documents/<doc_hash>` entry is named by the content hash of its
//! own bytes. [`verify_evidence_pack`] re-hashes each one and fails closed
//! with `INTEGRITY_MISMATCH` if the bytes don't match the name — there is
//! no separate checksums manifest to go stale or to trust blindly.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_compiler::CompiledPlan;
use compliance_core::{Assessment, Chunk, DocHash, RunManifest};
use compliance_coverage::CoverageMatrix;
use compliance_error::{ComplianceError, ErrorKind, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;

const DOCUMENTS_PREFIX: &str = "documents/";

fn fixed_file_options() -> FileOptions {
    let timestamp = zip::DateTime::from_date_and_time(1980, 1, 1, 0, 0, 0)
        .expect("1980-01-01 00:00:00 is a valid zip timestamp");
    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .last_modified_time(timestamp)
}

fn io_err(kind: ErrorKind, message: impl Into<String>, source: std::io::Error) -> ComplianceError {
    ComplianceError::new(kind, message).with_source(source)
}

fn canon_err(kind: ErrorKind, message: impl Into<String>, source: compliance_canon::CanonError) -> ComplianceError {
    ComplianceError::new(kind, message).with_source(source)
}

/// Everything needed to assemble one run's evidence pack.
pub struct EvidencePackInput<'a> {
    /// The run's manifest, including `run_hash`.
    pub manifest: &'a RunManifest,
    /// The compiled regulatory plan this run assessed against.
    pub plan: &'a CompiledPlan,
    /// The per-obligation coverage matrix.
    pub coverage: &'a CoverageMatrix,
    /// Every persisted assessment for the run.
    pub assessments: &'a [Assessment],
    /// Every chunk cited by at least one assessment's evidence citations.
    /// Chunks not cited by any assessment are omitted even if passed in.
    pub evidence_chunks: &'a [Chunk],
    /// Source document bytes, keyed by `doc_hash`, for every document the
    /// run drew evidence from.
    pub documents: &'a [(DocHash, Vec<u8>)],
}

fn jsonl_bytes<T: serde::Serialize>(records: &[T]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        let line = compliance_canon::canonicalize(record)
            .map_err(|e| canon_err(ErrorKind::Integrity, "failed to canonicalize jsonl record", e))?;
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    Ok(out)
}

/// Build the deterministic zip archive for one completed run.
///
/// # Errors
///
/// Returns [`ErrorKind::Integrity`] if any record fails to canonicalize, or
/// an I/O-backed error if the in-memory zip writer fails.
pub fn build_evidence_pack(input: &EvidencePackInput<'_>) -> Result<Vec<u8>> {
    let mut assessments = input.assessments.to_vec();
    assessments.sort_by(|a, b| a.datapoint_key.cmp(&b.datapoint_key));

    let cited: BTreeSet<&str> = assessments
        .iter()
        .flat_map(|a| a.evidence_chunk_ids.iter().map(String::as_str))
        .collect();
    let mut evidence: Vec<&Chunk> = input
        .evidence_chunks
        .iter()
        .filter(|c| cited.contains(c.chunk_id.as_str()))
        .collect();
    evidence.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));

    let mut documents = input.documents.to_vec();
    documents.sort_by(|a, b| a.0.cmp(&b.0));

    let manifest_json = compliance_canon::canonicalize(input.manifest)
        .map_err(|e| canon_err(ErrorKind::Integrity, "failed to canonicalize manifest", e))?;
    let plan_json = compliance_canon::canonicalize(input.plan)
        .map_err(|e| canon_err(ErrorKind::Integrity, "failed to canonicalize compiled plan", e))?;
    let coverage_json = compliance_canon::canonicalize(input.coverage)
        .map_err(|e| canon_err(ErrorKind::Integrity, "failed to canonicalize coverage matrix", e))?;
    let assessments_jsonl = jsonl_bytes(&assessments)?;
    let evidence_jsonl = jsonl_bytes(&evidence)?;

    let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    entries.insert("manifest.json".to_string(), manifest_json.into_bytes());
    entries.insert("compiled_plan.json".to_string(), plan_json.into_bytes());
    entries.insert("coverage_matrix.json".to_string(), coverage_json.into_bytes());
    entries.insert("assessments.jsonl".to_string(), assessments_jsonl);
    entries.insert("evidence.jsonl".to_string(), evidence_jsonl);
    for (doc_hash, bytes) in &documents {
        entries.insert(format!("{DOCUMENTS_PREFIX}{doc_hash}"), bytes.clone());
    }

    let options = fixed_file_options();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, bytes) in &entries {
        writer
            .start_file(path, options)
            .map_err(|e| ComplianceError::new(ErrorKind::Integrity, format!("failed to add entry {path}")).with_source(e))?;
        writer
            .write_all(bytes)
            .map_err(|e| io_err(ErrorKind::Integrity, format!("failed to write entry {path}"), e))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ComplianceError::new(ErrorKind::Integrity, "failed to finalize evidence pack").with_source(e))?;

    tracing::info!(entries = entries.len(), "built evidence pack");
    Ok(cursor.into_inner())
}

/// Re-hash every `documents/<doc_hash>` entry and compare against the hash
/// embedded in its own name.
///
/// # Errors
///
/// Returns [`ErrorKind::Integrity`] with `reason_code` `INTEGRITY_MISMATCH`
/// if the archive cannot be read or any document entry's content hash does
/// not match the hash in its name.
pub fn verify_evidence_pack(bytes: &[u8]) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ComplianceError::new(ErrorKind::Integrity, "failed to read evidence pack").with_source(e))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    for name in &names {
        let Some(doc_hash) = name.strip_prefix(DOCUMENTS_PREFIX) else {
            continue;
        };
        let mut data = Vec::new();
        archive
            .by_name(name)
            .map_err(|e| ComplianceError::new(ErrorKind::Integrity, format!("failed to read entry {name}")).with_source(e))?
            .read_to_end(&mut data)
            .map_err(|e| io_err(ErrorKind::Integrity, format!("failed to read entry {name}"), e))?;
        let actual = compliance_canon::sha256_hex(&data);
        if actual != doc_hash {
            return Err(ComplianceError::new(ErrorKind::Integrity, format!("document hash mismatch for {name}"))
                .with_context("reason_code", "INTEGRITY_MISMATCH")
                .with_context("expected", doc_hash.to_string())
                .with_context("actual", actual));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_compiler::CompiledObligation;
    use compliance_core::manifest::BundleRef;
    use compliance_core::{AssessmentStatus, RetrievalParams};

    fn manifest() -> RunManifest {
        RunManifest {
            run_id: uuid::Uuid::nil(),
            document_hashes: vec!["doc1".to_string()],
            bundle_refs: vec![BundleRef {
                bundle_id: "esrs_mini".to_string(),
                version: "2026.01".to_string(),
                checksum: "deadbeef".to_string(),
            }],
            plan_hash: "planhash".to_string(),
            retrieval_params: RetrievalParams::default(),
            provider_identity: "deterministic-fallback".to_string(),
            prompt_template_version: "v1".to_string(),
            code_version: "0000000".to_string(),
            report_template_version: "v1".to_string(),
            run_hash: "runhash".to_string(),
        }
    }

    fn plan() -> CompiledPlan {
        CompiledPlan {
            bundle_refs: vec![("esrs_mini".to_string(), "2026.01".to_string(), "checksum".to_string())],
            obligations: vec![CompiledObligation {
                code: "E1-6".to_string(),
                section: "Climate".to_string(),
                datapoint_keys: vec!["scope1".to_string()],
                mandatory: true,
                source_bundle_id: "esrs_mini".to_string(),
            }],
            excluded_obligations: vec![],
            excluded_datapoints: vec![],
            plan_hash: "planhash".to_string(),
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_hash: "doc1".to_string(),
            page_number: 1,
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
            token_count: 0,
            embedding: None,
        }
    }

    fn assessment(evidence: Vec<String>) -> Assessment {
        Assessment {
            run_id: uuid::Uuid::nil(),
            datapoint_key: "scope1".to_string(),
            status: AssessmentStatus::Present,
            value: Some("1234.5".to_string()),
            unit: Some("tCO2e".to_string()),
            year: Some(2026),
            baseline_year: None,
            baseline_value: None,
            rationale: "found".to_string(),
            evidence_chunk_ids: evidence,
            prompt_hash: "hash".to_string(),
            retrieval_params: RetrievalParams::default(),
        }
    }

    fn coverage() -> CoverageMatrix {
        compliance_coverage::build_coverage_matrix(&plan(), &[assessment(vec!["a".to_string()])], &["Climate".to_string()])
    }

    #[test]
    fn build_then_verify_round_trips() {
        let chunks = vec![chunk("a", "emissions were 1234.5 tCO2e")];
        let assessments = vec![assessment(vec!["a".to_string()])];
        let doc_bytes = b"hello world".to_vec();
        let documents = vec![(compliance_canon::sha256_hex(&doc_bytes), doc_bytes)];
        let input = EvidencePackInput {
            manifest: &manifest(),
            plan: &plan(),
            coverage: &coverage(),
            assessments: &assessments,
            evidence_chunks: &chunks,
            documents: &documents,
        };
        let bytes = build_evidence_pack(&input).unwrap();
        verify_evidence_pack(&bytes).unwrap();
    }

    #[test]
    fn build_is_byte_identical_across_runs() {
        let chunks = vec![chunk("a", "emissions were 1234.5 tCO2e")];
        let assessments = vec![assessment(vec!["a".to_string()])];
        let documents = vec![("doc1".to_string(), b"hello world".to_vec())];
        let input = EvidencePackInput {
            manifest: &manifest(),
            plan: &plan(),
            coverage: &coverage(),
            assessments: &assessments,
            evidence_chunks: &chunks,
            documents: &documents,
        };
        let first = build_evidence_pack(&input).unwrap();
        let second = build_evidence_pack(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn uncited_chunks_are_omitted_from_evidence_entry() {
        let chunks = vec![
            chunk("a", "emissions were 1234.5 tCO2e"),
            chunk("b", "an unrelated chunk never cited"),
        ];
        let assessments = vec![assessment(vec!["a".to_string()])];
        let documents = vec![("doc1".to_string(), b"hello world".to_vec())];
        let input = EvidencePackInput {
            manifest: &manifest(),
            plan: &plan(),
            coverage: &coverage(),
            assessments: &assessments,
            evidence_chunks: &chunks,
            documents: &documents,
        };
        let bytes = build_evidence_pack(&input).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut text = String::new();
        archive.by_name("evidence.jsonl").unwrap().read_to_string(&mut text).unwrap();
        assert!(text.contains("\"chunk_id\":\"a\""));
        assert!(!text.contains("\"chunk_id\":\"b\""));
    }

    #[test]
    fn document_entry_with_wrong_hash_fails_verification() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("manifest.json", fixed_file_options()).unwrap();
        writer.write_all(b"{}").unwrap();
        writer
            .start_file(format!("{DOCUMENTS_PREFIX}{}", "0".repeat(64)), fixed_file_options())
            .unwrap();
        writer.write_all(b"these bytes don't hash to all zeroes").unwrap();
        let cursor = writer.finish().unwrap();
        let err = verify_evidence_pack(&cursor.into_inner()).unwrap_err();
        assert_eq!(
            err.context.get("reason_code").and_then(|v| v.as_str()),
            Some("INTEGRITY_MISMATCH")
        );
    }

    #[test]
    fn document_entry_with_matching_hash_passes_verification() {
        let bytes = b"hello world";
        let doc_hash = compliance_canon::sha256_hex(bytes);
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("manifest.json", fixed_file_options()).unwrap();
        writer.write_all(b"{}").unwrap();
        writer
            .start_file(format!("{DOCUMENTS_PREFIX}{doc_hash}"), fixed_file_options())
            .unwrap();
        writer.write_all(bytes).unwrap();
        let cursor = writer.finish().unwrap();
        verify_evidence_pack(&cursor.into_inner()).unwrap();
    }

    #[test]
    fn built_pack_has_exactly_the_expected_entries() {
        let chunks = vec![chunk("a", "emissions were 1234.5 tCO2e")];
        let assessments = vec![assessment(vec!["a".to_string()])];
        let documents = vec![("doc1".to_string(), b"hello world".to_vec())];
        let input = EvidencePackInput {
            manifest: &manifest(),
            plan: &plan(),
            coverage: &coverage(),
            assessments: &assessments,
            evidence_chunks: &chunks,
            documents: &documents,
        };
        let bytes = build_evidence_pack(&input).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "assessments.jsonl".to_string(),
                "compiled_plan.json".to_string(),
                "coverage_matrix.json".to_string(),
                "documents/doc1".to_string(),
                "evidence.jsonl".to_string(),
                "manifest.json".to_string(),
            ]
        );
    }
}
