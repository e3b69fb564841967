// SPDX-License-Identifier: MIT OR Apache-2.0
//! Extraction provider adapter (C8).
//!
//! An [`ExtractionProvider`] turns one datapoint's retrieved chunks into a
//! proposed [`ExtractionResponse`]. Two implementations ship here: a
//! [`FallbackProvider`] that never leaves the process and never calls out
//! — it always emits `Absent` with a fixed rationale, used when no
//! external model is configured or as a downgrade target — and an
//! [`HttpSchemaProvider`] that calls a schema-constrained
//! HTTP endpoint at temperature zero with bounded local retry on transport
//! failure only — never on a schema or validation failure, since retrying
//! those would just reproduce the same bad response.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use compliance_core::{AssessmentStatus, Chunk, ChunkId};
use compliance_error::{ComplianceError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Request / response types ────────────────────────────────────────────

/// Everything an extraction provider needs to assess one datapoint.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    /// Datapoint key being assessed.
    pub datapoint_key: String,
    /// Human-readable datapoint label.
    pub datapoint_label: String,
    /// `true` if a comparative baseline figure is also required.
    pub requires_baseline: bool,
    /// Controlled unit vocabulary, empty for non-numeric datapoints.
    pub unit_vocabulary: Vec<String>,
    /// Retrieved chunks, in retrieval-rank order. The provider may cite any
    /// subset of these `chunk_id`s as evidence.
    pub chunks: Vec<Chunk>,
    /// Version of the prompt template used to compose the request.
    pub prompt_template_version: String,
}

impl ExtractionRequest {
    /// The `chunk_id`s made available to the provider, for evidence-gating
    /// after the response comes back.
    pub fn available_chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.chunk_id.clone()).collect()
    }
}

/// A provider's proposed assessment of one datapoint, prior to
/// verification (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResponse {
    /// Proposed status.
    pub status: AssessmentStatus,
    /// Extracted value, as a string (numeric values keep their literal
    /// text so the verifier can apply tolerant numeric matching).
    pub value: Option<String>,
    /// Unit, if the datapoint is numeric.
    pub unit: Option<String>,
    /// Reporting year the value applies to.
    pub year: Option<u16>,
    /// Baseline year, if `requires_baseline`.
    pub baseline_year: Option<u16>,
    /// Baseline value, if `requires_baseline`.
    pub baseline_value: Option<String>,
    /// One-line rationale citing where the value came from.
    pub rationale: String,
    /// Chunk IDs the provider claims as evidence for `value`.
    pub evidence_chunk_ids: Vec<ChunkId>,
}

impl ExtractionResponse {
    fn absent(rationale: impl Into<String>) -> Self {
        Self {
            status: AssessmentStatus::Absent,
            value: None,
            unit: None,
            year: None,
            baseline_year: None,
            baseline_value: None,
            rationale: rationale.into(),
            evidence_chunk_ids: Vec::new(),
        }
    }
}

/// Compute the deterministic `prompt_hash` for a request: the exact
/// canonicalized content a provider was shown, independent of retrieval
/// candidate insertion order.
pub fn prompt_hash(request: &ExtractionRequest) -> Result<String> {
    compliance_canon::fingerprint(request)
        .map_err(|e| ComplianceError::new(ErrorKind::Integrity, "failed to fingerprint prompt").with_source(e))
}

/// Enforce the evidence-gating invariant before a response is ever
/// persisted: a `Present`/`Partial` status must cite at least one chunk
/// that was actually offered to the provider and carries non-empty text.
/// Any violation downgrades the response to `Absent` with reason
/// `EVIDENCE_MISSING` — it never reaches the verifier in a state that
/// would violate the invariant.
pub fn enforce_evidence_gating(
    mut response: ExtractionResponse,
    request: &ExtractionRequest,
) -> ExtractionResponse {
    if !response.status.requires_evidence() {
        return response;
    }

    let available = request.available_chunk_ids();
    let text_by_id: std::collections::HashMap<&str, &str> = request
        .chunks
        .iter()
        .map(|c| (c.chunk_id.as_str(), c.text.as_str()))
        .collect();

    let valid_citations: Vec<ChunkId> = response
        .evidence_chunk_ids
        .iter()
        .filter(|id| {
            available.contains(id)
                && text_by_id
                    .get(id.as_str())
                    .is_some_and(|t| !t.is_empty())
        })
        .cloned()
        .collect();

    if valid_citations.is_empty() {
        tracing::warn!(
            datapoint_key = %request.datapoint_key,
            "evidence gating downgraded response to Absent"
        );
        response = ExtractionResponse::absent("EVIDENCE_MISSING: no valid citation offered");
    } else {
        response.evidence_chunk_ids = valid_citations;
    }

    response
}

// ── Provider trait ──────────────────────────────────────────────────────

/// Turns a request into a proposed assessment.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Stable identity string recorded into the run manifest, e.g.
    /// `"deterministic-fallback"` or `"http-schema/gpt-4o/v3"`.
    fn identity(&self) -> &str;

    /// Assess one datapoint.
    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResponse>;
}

// ── Fallback provider ───────────────────────────────────────────────────

/// Deterministic, zero-external-call provider: never inspects chunk
/// content and never calls out. Every datapoint comes back `Absent` with
/// a fixed rationale — used when no HTTP provider is configured, and as
/// the safety net an orchestrator can fall back to on repeated provider
/// failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackProvider;

#[async_trait]
impl ExtractionProvider for FallbackProvider {
    fn identity(&self) -> &str {
        "deterministic-fallback"
    }

    async fn extract(&self, _request: &ExtractionRequest) -> Result<ExtractionResponse> {
        Ok(ExtractionResponse::absent(
            "deterministic-fallback never calls out: datapoint not assessed",
        ))
    }
}

// ── HTTP schema-constrained provider ────────────────────────────────────

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Serialize)]
struct HttpExtractionPayload<'a> {
    datapoint_key: &'a str,
    datapoint_label: &'a str,
    requires_baseline: bool,
    unit_vocabulary: &'a [String],
    chunks: Vec<HttpChunkRef<'a>>,
    temperature: f64,
    response_format: &'static str,
}

#[derive(Serialize)]
struct HttpChunkRef<'a> {
    chunk_id: &'a str,
    text: &'a str,
}

/// Calls a schema-constrained extraction endpoint over HTTP. Always sends
/// `temperature: 0` and requests strict-schema JSON; transport and 5xx
/// failures are retried locally with bounded exponential backoff, but a
/// malformed or schema-invalid response is never retried — it is surfaced
/// as `ErrorKind::ProviderSchema` immediately.
pub struct HttpSchemaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpSchemaProvider {
    /// Build a provider targeting `endpoint`, identifying responses under
    /// `model`.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    async fn call_once(&self, request: &ExtractionRequest) -> Result<ExtractionResponse> {
        let payload = HttpExtractionPayload {
            datapoint_key: &request.datapoint_key,
            datapoint_label: &request.datapoint_label,
            requires_baseline: request.requires_baseline,
            unit_vocabulary: &request.unit_vocabulary,
            chunks: request
                .chunks
                .iter()
                .map(|c| HttpChunkRef {
                    chunk_id: &c.chunk_id,
                    text: &c.text,
                })
                .collect(),
            temperature: 0.0,
            response_format: "json_schema",
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                ComplianceError::new(ErrorKind::Dependency, "provider request failed")
                    .with_context("endpoint", &self.endpoint)
                    .with_context("transport_error", e.to_string())
            })?;

        if resp.status().is_server_error() {
            return Err(ComplianceError::new(
                ErrorKind::Dependency,
                "provider returned a server error",
            )
            .with_context("status", resp.status().as_u16()));
        }
        if !resp.status().is_success() {
            return Err(ComplianceError::new(
                ErrorKind::ProviderSchema,
                "provider returned a non-success status",
            )
            .with_context("status", resp.status().as_u16()));
        }

        resp.json::<ExtractionResponse>().await.map_err(|e| {
            ComplianceError::new(ErrorKind::ProviderSchema, "provider response did not match schema")
                .with_context("detail", e.to_string())
        })
    }
}

#[async_trait]
impl ExtractionProvider for HttpSchemaProvider {
    fn identity(&self) -> &str {
        &self.model
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResponse> {
        let mut attempt = 0;
        loop {
            match self.call_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.kind.is_retryable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        datapoint_key = %request.datapoint_key,
                        attempt,
                        ?delay,
                        "retrying provider call after dependency failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_hash: "doc".to_string(),
            page_number: 1,
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            embedding: None,
        }
    }

    fn request(chunks: Vec<Chunk>) -> ExtractionRequest {
        ExtractionRequest {
            datapoint_key: "scope1_emissions_tco2e".to_string(),
            datapoint_label: "scope 1 emissions".to_string(),
            requires_baseline: false,
            unit_vocabulary: vec!["tCO2e".to_string()],
            chunks,
            prompt_template_version: "v1".to_string(),
        }
    }

    #[tokio::test]
    async fn fallback_is_always_absent_even_with_a_matching_chunk() {
        let req = request(vec![chunk("a", "our scope 1 emissions were 1234.5 tCO2e")]);
        let resp = FallbackProvider.extract(&req).await.unwrap();
        assert_eq!(resp.status, AssessmentStatus::Absent);
        assert!(resp.value.is_none());
        assert!(resp.evidence_chunk_ids.is_empty());
    }

    #[tokio::test]
    async fn fallback_absent_without_match() {
        let req = request(vec![chunk("a", "unrelated text about weather")]);
        let resp = FallbackProvider.extract(&req).await.unwrap();
        assert_eq!(resp.status, AssessmentStatus::Absent);
        assert!(resp.evidence_chunk_ids.is_empty());
    }

    #[test]
    fn evidence_gating_downgrades_fabricated_citation() {
        let req = request(vec![chunk("a", "scope 1 emissions text")]);
        let response = ExtractionResponse {
            status: AssessmentStatus::Present,
            value: Some("100".to_string()),
            unit: Some("tCO2e".to_string()),
            year: Some(2026),
            baseline_year: None,
            baseline_value: None,
            rationale: "claimed".to_string(),
            evidence_chunk_ids: vec!["does-not-exist".to_string()],
        };
        let gated = enforce_evidence_gating(response, &req);
        assert_eq!(gated.status, AssessmentStatus::Absent);
    }

    #[test]
    fn evidence_gating_passes_valid_citation() {
        let req = request(vec![chunk("a", "scope 1 emissions text")]);
        let response = ExtractionResponse {
            status: AssessmentStatus::Present,
            value: Some("100".to_string()),
            unit: Some("tCO2e".to_string()),
            year: Some(2026),
            baseline_year: None,
            baseline_value: None,
            rationale: "found it".to_string(),
            evidence_chunk_ids: vec!["a".to_string()],
        };
        let gated = enforce_evidence_gating(response, &req);
        assert_eq!(gated.status, AssessmentStatus::Present);
    }

    #[test]
    fn not_applicable_status_is_never_gated() {
        let req = request(vec![]);
        let response = ExtractionResponse {
            status: AssessmentStatus::NotApplicable,
            value: None,
            unit: None,
            year: None,
            baseline_year: None,
            baseline_value: None,
            rationale: "not applicable to this company".to_string(),
            evidence_chunk_ids: vec![],
        };
        let gated = enforce_evidence_gating(response, &req);
        assert_eq!(gated.status, AssessmentStatus::NotApplicable);
    }

    #[test]
    fn prompt_hash_is_deterministic() {
        let req = request(vec![chunk("a", "text")]);
        assert_eq!(prompt_hash(&req).unwrap(), prompt_hash(&req).unwrap());
    }

    #[test]
    fn prompt_hash_changes_with_template_version() {
        let mut a = request(vec![chunk("a", "text")]);
        let original = prompt_hash(&a).unwrap();
        a.prompt_template_version = "v2".to_string();
        assert_ne!(original, prompt_hash(&a).unwrap());
    }
}
