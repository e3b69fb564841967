// SPDX-License-Identifier: MIT OR Apache-2.0
//! Assessment and extraction-diagnostic records (data model §3).

use crate::{ChunkId, retrieval::RetrievalParams};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Datapoint-level verdict.
///
/// `NeedsReview` is a distinct terminal status, reserved for
/// verifier-injected cases only (never emitted directly by the extraction
/// adapter) — see Open Questions in the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    /// Disclosure found and fully supports the datapoint.
    Present,
    /// Disclosure found but incomplete (e.g. numeric mismatch on first strike).
    Partial,
    /// No supporting disclosure found, or evidence gating failed.
    Absent,
    /// Datapoint does not apply to this company/period.
    NotApplicable,
    /// Verifier flagged the candidate as requiring human review.
    NeedsReview,
}

impl AssessmentStatus {
    /// `true` for `Present`/`Partial`, the two statuses that require cited,
    /// existent, non-empty evidence (the evidence-gating invariant).
    pub fn requires_evidence(&self) -> bool {
        matches!(self, Self::Present | Self::Partial)
    }
}

/// One datapoint's persisted verdict for a run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Assessment {
    /// Owning run.
    pub run_id: uuid::Uuid,
    /// Datapoint key, e.g. `"ESRS-E1-1"`.
    pub datapoint_key: String,
    /// Classification.
    pub status: AssessmentStatus,
    /// Extracted metric value, if applicable.
    pub value: Option<String>,
    /// Declared unit, normalized (§4.9).
    pub unit: Option<String>,
    /// Reporting year the value pertains to.
    pub year: Option<u16>,
    /// Baseline year, for `requires_baseline` metrics.
    pub baseline_year: Option<u16>,
    /// Baseline value, for `requires_baseline` metrics.
    pub baseline_value: Option<String>,
    /// Short, human-readable justification.
    pub rationale: String,
    /// Cited chunk IDs. Non-empty whenever `status` requires evidence.
    pub evidence_chunk_ids: Vec<ChunkId>,
    /// Hash of the canonical prompt structure sent to the provider.
    pub prompt_hash: String,
    /// Retrieval parameters actually used, replayable.
    pub retrieval_params: RetrievalParams,
}

impl Assessment {
    /// Evidence-gating invariant (testable property 3): `status ∈
    /// {Present, Partial} ⇒ evidence_chunk_ids` is non-empty. Existence and
    /// non-emptiness of the cited chunks themselves is checked against the
    /// document store by the verification engine, not here — this is a
    /// purely structural check over the persisted record.
    pub fn satisfies_evidence_gating(&self) -> bool {
        !self.status.requires_evidence() || !self.evidence_chunk_ids.is_empty()
    }
}

/// Reason a candidate assessment failed verification and was downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReasonCode {
    /// A cited chunk ID does not exist in the document store.
    ChunkNotFound,
    /// A cited chunk exists but has empty text.
    EmptyChunk,
    /// Extracted numeric value was not found in any cited chunk.
    NumericMismatch,
    /// `requires_baseline` datapoint is missing baseline year/value.
    BaselineMissing,
    /// Declared unit is not in the controlled vocabulary.
    UnitMismatch,
    /// Metric datapoint is missing its reporting year.
    YearMissing,
}

/// Per-datapoint retrieval/extraction/verification diagnostic, persisted
/// alongside every [`Assessment`] regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionDiagnostic {
    /// Owning run.
    pub run_id: uuid::Uuid,
    /// Datapoint key this diagnostic covers.
    pub datapoint_key: String,
    /// Chunk IDs retrieved for this datapoint, in retrieval order.
    pub retrieved_chunk_ids: Vec<ChunkId>,
    /// Count of cited-numeric matches found during verification.
    pub numeric_matches_found: u32,
    /// Human-readable summary of the verification outcome.
    pub verification_status: String,
    /// Populated when verification downgraded the candidate.
    pub failure_reason_code: Option<FailureReasonCode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_assessment(status: AssessmentStatus, evidence: Vec<ChunkId>) -> Assessment {
        Assessment {
            run_id: uuid::Uuid::nil(),
            datapoint_key: "ESRS-E1-1".into(),
            status,
            value: None,
            unit: None,
            year: None,
            baseline_year: None,
            baseline_value: None,
            rationale: "test".into(),
            evidence_chunk_ids: evidence,
            prompt_hash: "hash".into(),
            retrieval_params: RetrievalParams::default(),
        }
    }

    #[test]
    fn present_without_evidence_fails_gating() {
        let a = base_assessment(AssessmentStatus::Present, vec![]);
        assert!(!a.satisfies_evidence_gating());
    }

    #[test]
    fn present_with_evidence_passes_gating() {
        let a = base_assessment(AssessmentStatus::Present, vec!["c1".into()]);
        assert!(a.satisfies_evidence_gating());
    }

    #[test]
    fn absent_never_requires_evidence() {
        let a = base_assessment(AssessmentStatus::Absent, vec![]);
        assert!(a.satisfies_evidence_gating());
    }

    #[test]
    fn not_applicable_never_requires_evidence() {
        let a = base_assessment(AssessmentStatus::NotApplicable, vec![]);
        assert!(a.satisfies_evidence_gating());
    }
}
