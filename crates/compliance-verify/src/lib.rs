// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verification engine (C9): citation existence, numeric tolerant
//! matching, baseline/unit/year checks, and the `Present -> Partial ->
//! Absent` downgrade state machine.
//!
//! Verification never *upgrades* a candidate — it only ever holds it or
//! steps it down one level per failed check, in a fixed check order, so
//! the same candidate always downgrades to the same final status.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_bundle::{Datapoint, DatapointType};
use compliance_core::{AssessmentStatus, Chunk, ChunkId, FailureReasonCode};
use std::collections::HashMap;

/// A provider's proposed verdict, prior to verification.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Proposed status.
    pub status: AssessmentStatus,
    /// Proposed value.
    pub value: Option<String>,
    /// Proposed unit.
    pub unit: Option<String>,
    /// Proposed reporting year.
    pub year: Option<u16>,
    /// Proposed baseline year.
    pub baseline_year: Option<u16>,
    /// Proposed baseline value.
    pub baseline_value: Option<String>,
    /// Proposed rationale.
    pub rationale: String,
    /// Proposed evidence citations.
    pub evidence_chunk_ids: Vec<ChunkId>,
}

/// Result of running verification over a [`Candidate`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    /// The candidate, downgraded in place if any check failed.
    pub candidate: Candidate,
    /// Count of cited chunks whose text contained a numeric match for
    /// `candidate.value`, for the diagnostic record.
    pub numeric_matches_found: u32,
    /// Human-readable summary, e.g. `"passed"` or `"downgraded: unit_mismatch"`.
    pub verification_status: String,
    /// The first failure reason encountered, if the candidate was downgraded.
    pub failure_reason_code: Option<FailureReasonCode>,
}

fn downgrade_one_step(status: AssessmentStatus) -> AssessmentStatus {
    match status {
        AssessmentStatus::Present => AssessmentStatus::Partial,
        AssessmentStatus::Partial => AssessmentStatus::Absent,
        other => other,
    }
}

fn normalize_numeral(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

fn chunk_contains_numeral(chunk_text: &str, value: &str) -> bool {
    let needle = normalize_numeral(value);
    if needle.is_empty() {
        return false;
    }
    let haystack = normalize_numeral(chunk_text);
    haystack.contains(&needle)
}

/// Verify `candidate` against `datapoint`'s rules, using `available_chunks`
/// as the source of truth for citation existence and text content.
///
/// Check order (first failure wins, exactly one downgrade applied):
/// citation existence, numeric match, unit vocabulary, reporting year,
/// baseline completeness.
pub fn verify(
    mut candidate: Candidate,
    datapoint: &Datapoint,
    available_chunks: &[Chunk],
) -> VerificationOutcome {
    if !candidate.status.requires_evidence() {
        return VerificationOutcome {
            candidate,
            numeric_matches_found: 0,
            verification_status: "no_evidence_required".to_string(),
            failure_reason_code: None,
        };
    }

    let by_id: HashMap<&str, &Chunk> = available_chunks
        .iter()
        .map(|c| (c.chunk_id.as_str(), c))
        .collect();

    let cited_chunks: Vec<&Chunk> = candidate
        .evidence_chunk_ids
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .collect();

    if cited_chunks.len() != candidate.evidence_chunk_ids.len() {
        candidate.status = AssessmentStatus::Absent;
        candidate.evidence_chunk_ids.clear();
        return VerificationOutcome {
            candidate,
            numeric_matches_found: 0,
            verification_status: "downgraded: chunk_not_found".to_string(),
            failure_reason_code: Some(FailureReasonCode::ChunkNotFound),
        };
    }
    if cited_chunks.iter().any(|c| c.text.is_empty()) {
        candidate.status = AssessmentStatus::Absent;
        candidate.evidence_chunk_ids.clear();
        return VerificationOutcome {
            candidate,
            numeric_matches_found: 0,
            verification_status: "downgraded: empty_chunk".to_string(),
            failure_reason_code: Some(FailureReasonCode::EmptyChunk),
        };
    }

    let mut numeric_matches_found = 0u32;
    if datapoint.datapoint_type == DatapointType::Numeric {
        if let Some(value) = &candidate.value {
            numeric_matches_found = cited_chunks
                .iter()
                .filter(|c| chunk_contains_numeral(&c.text, value))
                .count() as u32;
            if numeric_matches_found == 0 {
                candidate.status = downgrade_one_step(candidate.status);
                return VerificationOutcome {
                    candidate,
                    numeric_matches_found,
                    verification_status: "downgraded: numeric_mismatch".to_string(),
                    failure_reason_code: Some(FailureReasonCode::NumericMismatch),
                };
            }
        }

        if !datapoint.unit_vocabulary.is_empty() {
            let unit_ok = candidate
                .unit
                .as_ref()
                .is_some_and(|u| datapoint.unit_vocabulary.iter().any(|v| v == u));
            if !unit_ok {
                candidate.status = downgrade_one_step(candidate.status);
                return VerificationOutcome {
                    candidate,
                    numeric_matches_found,
                    verification_status: "downgraded: unit_mismatch".to_string(),
                    failure_reason_code: Some(FailureReasonCode::UnitMismatch),
                };
            }
        }

        if candidate.year.is_none() {
            candidate.status = downgrade_one_step(candidate.status);
            return VerificationOutcome {
                candidate,
                numeric_matches_found,
                verification_status: "downgraded: year_missing".to_string(),
                failure_reason_code: Some(FailureReasonCode::YearMissing),
            };
        }
    }

    if datapoint.requires_baseline
        && (candidate.baseline_year.is_none() || candidate.baseline_value.is_none())
    {
        candidate.status = downgrade_one_step(candidate.status);
        return VerificationOutcome {
            candidate,
            numeric_matches_found,
            verification_status: "downgraded: baseline_missing".to_string(),
            failure_reason_code: Some(FailureReasonCode::BaselineMissing),
        };
    }

    VerificationOutcome {
        candidate,
        numeric_matches_found,
        verification_status: "passed".to_string(),
        failure_reason_code: None,
    }
}
