// SPDX-License-Identifier: MIT OR Apache-2.0
//! Route handlers for the core HTTP surface (§6.1).
//!
//! Every handler takes the authenticated [`TenantId`] as an extension and
//! treats it as the sole scoping key: a lookup for an entity owned by a
//! different tenant returns `NotFound`, never `Authz` — cross-tenant reads
//! must never confirm that the entity exists at all.

use crate::auth::TenantId;
use crate::error::ApiError;
use crate::state::{AppState, RunRecord};
use axum::extract::{Extension, Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use compliance_core::{
    CandidateDecision, CompanyProfile, DiscoveredCandidate, ListedStatus, Run, RunStatus,
};
use compliance_error::{ComplianceError, ErrorKind, Result as PipelineResult};
use compliance_extract::Extractor as _;
use compliance_orchestrator::{CancellationToken, RunContext};
use compliance_provider::{ExtractionProvider, FallbackProvider, HttpSchemaProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

fn not_found(entity: &str) -> ApiError {
    ComplianceError::new(ErrorKind::NotFound, format!("{entity} not found")).into()
}

async fn company_for_tenant(state: &AppState, tenant: TenantId, company_id: Uuid) -> PipelineResult<CompanyProfile> {
    let companies = state.companies.read().await;
    match companies.get(&company_id) {
        Some(profile) if profile.tenant_id == tenant.0 => Ok(profile.clone()),
        _ => Err(ComplianceError::new(ErrorKind::NotFound, "company not found")),
    }
}

async fn linked_document_bytes(state: &AppState, profile: &CompanyProfile) -> PipelineResult<Vec<(String, Vec<u8>)>> {
    let hashes = state
        .document_store
        .linked_documents(profile.tenant_id, profile.company_id)
        .await?;
    let mut documents = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let bytes = state.document_store.get(&hash).await?;
        documents.push((hash, bytes));
    }
    Ok(documents)
}

fn build_chunks(doc_hash: &str, bytes: &[u8], content_type: &str, chunker: &compliance_config::ChunkerSettings) -> PipelineResult<Vec<compliance_core::Chunk>> {
    let params = compliance_chunk::ChunkParams {
        target_len: chunker.target_len,
        overlap: chunker.overlap,
    };
    let pages = compliance_extract::DeterministicExtractor.extract(&doc_hash.to_string(), bytes, content_type)
        .unwrap_or_default();
    Ok(pages.iter().flat_map(|page| compliance_chunk::chunk_page(page, &params)).collect())
}

// ── POST /companies ─────────────────────────────────────────────────────

/// Request body for `POST /companies`, mirroring the applicability
/// evaluator's whitelist (§4.7) field for field.
#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub employees: u64,
    pub turnover: f64,
    pub listed_status: ListedStatus,
    pub reporting_year: u16,
    pub reporting_year_start: NaiveDate,
    pub reporting_year_end: NaiveDate,
    pub jurisdictions: Vec<String>,
    pub regimes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateCompanyResponse {
    pub company_id: Uuid,
}

pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<Json<CreateCompanyResponse>, ApiError> {
    let company_id = Uuid::new_v4();
    let profile = CompanyProfile {
        tenant_id: tenant.0,
        company_id,
        name: req.name,
        employees: req.employees,
        turnover: req.turnover,
        listed_status: req.listed_status,
        reporting_year: req.reporting_year,
        reporting_year_start: req.reporting_year_start,
        reporting_year_end: req.reporting_year_end,
        jurisdictions: req.jurisdictions,
        regimes: req.regimes,
    };
    let companies_dir = state.data_dir.join("companies");
    tokio::fs::create_dir_all(&companies_dir)
        .await
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Dependency, "create companies directory").with_source(e)))?;
    let profile_json = serde_json::to_vec_pretty(&profile)
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Validation, "serialize company profile").with_source(e)))?;
    tokio::fs::write(companies_dir.join(format!("{company_id}.json")), profile_json)
        .await
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Dependency, "write company profile").with_source(e)))?;

    state.companies.write().await.insert(company_id, profile);
    Ok(Json(CreateCompanyResponse { company_id }))
}

// ── POST /documents/upload ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadDocumentResponse {
    pub document_id: String,
    pub duplicate: bool,
}

const ALLOWED_MANUAL_CONTENT_TYPES: &[&str] = &["application/pdf", "text/plain", "text/markdown"];

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    mut multipart: Multipart,
) -> Result<Json<UploadDocumentResponse>, ApiError> {
    let mut company_id: Option<Uuid> = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut content_type = "application/pdf".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Validation, "malformed multipart body").with_source(e)))?
    {
        match field.name().unwrap_or_default() {
            "company_id" => {
                let text = field.text().await.unwrap_or_default();
                company_id = Uuid::parse_str(&text).ok();
            }
            "file" => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                bytes = Some(field.bytes().await.map(|b| b.to_vec()).unwrap_or_default());
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let company_id = company_id.ok_or_else(|| ComplianceError::new(ErrorKind::Validation, "missing company_id field"))?;
    let bytes = bytes.ok_or_else(|| ComplianceError::new(ErrorKind::Validation, "missing file field"))?;
    let profile = company_for_tenant(&state, tenant, company_id).await?;

    if !ALLOWED_MANUAL_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ComplianceError::new(ErrorKind::Validation, "unsupported content type for manual upload")
            .with_context("reason_code", "UNSUPPORTED_FORMAT")
            .with_context("content_type", &content_type)
            .into());
    }

    let outcome = state.document_store.put(bytes, &content_type).await?;
    state
        .document_store
        .link(profile.tenant_id, profile.company_id, &outcome.doc_hash)
        .await?;

    Ok(Json(UploadDocumentResponse {
        document_id: outcome.doc_hash,
        duplicate: outcome.duplicate,
    }))
}

// ── POST /documents/auto-discover ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AutoDiscoverRequest {
    pub company_id: Uuid,
    pub max_documents: usize,
}

#[derive(Debug, Serialize)]
pub struct AutoDiscoverResponse {
    pub candidates: Vec<DiscoveredCandidate>,
}

pub async fn auto_discover(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Json(req): Json<AutoDiscoverRequest>,
) -> Result<Json<AutoDiscoverResponse>, ApiError> {
    let profile = company_for_tenant(&state, tenant, req.company_id).await?;
    let leads = state.candidate_source.discover(&profile, req.max_documents).await;

    let mut candidates = Vec::with_capacity(leads.len());
    for lead in leads {
        if lead.content_type != "application/pdf" {
            candidates.push(DiscoveredCandidate {
                url: lead.url,
                title: lead.title,
                snippet: lead.snippet,
                decision: CandidateDecision::Rejected,
                reason: Some("UNSUPPORTED_FORMAT".to_string()),
            });
            continue;
        }

        let outcome = state.document_store.put(lead.bytes, &lead.content_type).await?;
        state
            .document_store
            .link(profile.tenant_id, profile.company_id, &outcome.doc_hash)
            .await?;
        candidates.push(DiscoveredCandidate {
            url: lead.url,
            title: lead.title,
            snippet: lead.snippet,
            decision: CandidateDecision::Ingested,
            reason: None,
        });
    }

    Ok(Json(AutoDiscoverResponse { candidates }))
}

// ── POST /runs ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub company_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Json(req): Json<CreateRunRequest>,
) -> Result<Json<CreateRunResponse>, ApiError> {
    let profile = company_for_tenant(&state, tenant, req.company_id).await?;
    let run_id = Uuid::new_v4();
    let run = Run {
        run_id,
        tenant_id: profile.tenant_id,
        company_id: profile.company_id,
        status: RunStatus::Queued,
        compiler_mode: String::new(),
        provider_id: String::new(),
        run_hash: String::new(),
        failure_reason: None,
    };
    state.runs.write().await.insert(
        run_id,
        RunRecord {
            run: run.clone(),
            plan: None,
            assessments: Vec::new(),
            diagnostics: Vec::new(),
            events: Vec::new(),
            manifest: None,
            coverage: None,
            evidence_pack: None,
        },
    );
    Ok(Json(CreateRunResponse {
        run_id,
        status: run.status,
    }))
}

// ── POST /runs/{id}/execute ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExecuteRunRequest {
    pub bundle_id: String,
    pub bundle_version: String,
    pub provider_id: String,
    pub compiler_mode: String,
}

fn resolve_provider(state: &AppState, provider_id: &str) -> PipelineResult<Arc<dyn ExtractionProvider>> {
    match provider_id {
        "deterministic-fallback" => Ok(Arc::new(FallbackProvider)),
        other => match &state.config.provider {
            compliance_config::ProviderSettings::HttpSchema { endpoint, model } if other == "http-schema" => {
                Ok(Arc::new(HttpSchemaProvider::new(endpoint.clone(), model.clone())))
            }
            _ => Err(ComplianceError::new(ErrorKind::Validation, "unknown provider_id")
                .with_context("provider_id", other)),
        },
    }
}

async fn run_for_tenant(state: &AppState, tenant: TenantId, run_id: Uuid) -> PipelineResult<RunRecord> {
    let runs = state.runs.read().await;
    match runs.get(&run_id) {
        Some(record) if record.run.tenant_id == tenant.0 => Ok(record.clone()),
        _ => Err(ComplianceError::new(ErrorKind::NotFound, "run not found")),
    }
}

pub async fn execute_run(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
    Json(req): Json<ExecuteRunRequest>,
) -> Result<Json<Run>, ApiError> {
    let existing = run_for_tenant(&state, tenant, run_id).await?;
    let profile = company_for_tenant(&state, tenant, existing.run.company_id).await?;

    let bundle = {
        let bundles = state.bundles.read().await;
        bundles
            .get(&(req.bundle_id.clone(), req.bundle_version.clone()))
            .cloned()
            .ok_or_else(|| ComplianceError::new(ErrorKind::NotFound, "bundle not found")
                .with_context("bundle_id", &req.bundle_id)
                .with_context("bundle_version", &req.bundle_version))?
    };

    let bundles = vec![bundle];
    let plan = compliance_compiler::compile(&bundles, &profile)?;

    let raw_documents = linked_document_bytes(&state, &profile).await?;
    let metadata_by_hash = {
        let mut m = std::collections::HashMap::new();
        for (hash, _) in &raw_documents {
            m.insert(hash.clone(), state.document_store.metadata(hash).await?);
        }
        m
    };
    let mut chunks = Vec::new();
    for (hash, bytes) in &raw_documents {
        let content_type = metadata_by_hash
            .get(hash)
            .map(|d| d.content_type.clone())
            .unwrap_or_else(|| "application/pdf".to_string());
        chunks.extend(build_chunks(hash, bytes, &content_type, &state.config.chunker)?);
        state.document_store.set_parser_version(hash, compliance_extract::PARSER_VERSION).await?;
    }

    let provider = resolve_provider(&state, &req.provider_id)?;

    let ctx = RunContext {
        run_id,
        company_profile: profile,
        bundles,
        chunks,
        documents: raw_documents,
        provider,
        config: state.config.clone(),
        compiler_mode: req.compiler_mode,
        code_version: state.code_version.clone(),
        prompt_template_version: state.prompt_template_version.clone(),
        report_template_version: state.report_template_version.clone(),
        cancellation: CancellationToken::new(),
        worker_concurrency: state.worker_concurrency,
    };

    let outcome = compliance_orchestrator::execute_run(ctx, state.run_cache.as_ref()).await?;

    let mut run = outcome.run;
    run.run_id = run_id;

    let events_dir = state.data_dir.join("runs").join(run_id.to_string());
    tokio::fs::create_dir_all(&events_dir)
        .await
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Dependency, "create run events directory").with_source(e)))?;
    let mut events_jsonl = String::new();
    for event in &outcome.events {
        events_jsonl.push_str(
            &serde_json::to_string(event)
                .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Validation, "serialize run event").with_source(e)))?,
        );
        events_jsonl.push('\n');
    }
    tokio::fs::write(events_dir.join("events.jsonl"), events_jsonl)
        .await
        .map_err(|e| ApiError(ComplianceError::new(ErrorKind::Dependency, "write run events").with_source(e)))?;

    let record = RunRecord {
        run: run.clone(),
        plan: Some(plan),
        assessments: outcome.assessments,
        diagnostics: outcome.diagnostics,
        events: outcome.events,
        manifest: outcome.manifest,
        coverage: outcome.coverage,
        evidence_pack: outcome.evidence_pack,
    };
    state.runs.write().await.insert(run_id, record);

    Ok(Json(run))
}

// ── GET /runs/{id}/status, /diagnostics, /report, /regulatory-plan ──────

pub async fn run_status(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(run_for_tenant(&state, tenant, run_id).await?.run))
}

pub async fn run_diagnostics(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Vec<compliance_core::ExtractionDiagnostic>>, ApiError> {
    Ok(Json(run_for_tenant(&state, tenant, run_id).await?.diagnostics))
}

pub async fn run_events(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Vec<compliance_core::RunEvent>>, ApiError> {
    Ok(Json(run_for_tenant(&state, tenant, run_id).await?.events))
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run: Run,
    pub coverage: Option<compliance_coverage::CoverageMatrix>,
    pub assessments: Vec<compliance_core::Assessment>,
}

pub async fn run_report(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunReport>, ApiError> {
    let record = run_for_tenant(&state, tenant, run_id).await?;
    Ok(Json(RunReport {
        run: record.run,
        coverage: record.coverage,
        assessments: record.assessments,
    }))
}

pub async fn regulatory_plan(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<compliance_compiler::CompiledPlan>, ApiError> {
    let record = run_for_tenant(&state, tenant, run_id).await?;
    record.plan.map(Json).ok_or_else(|| not_found("regulatory plan"))
}

// ── GET /runs/{id}/evidence-pack, /evidence-pack-preview ────────────────

pub async fn evidence_pack(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = run_for_tenant(&state, tenant, run_id).await?;
    let bytes = record.evidence_pack.ok_or_else(|| {
        ApiError(ComplianceError::new(ErrorKind::Conflict, "evidence pack is not ready for this run"))
    })?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/zip")],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct EvidencePackPreview {
    pub plan_hash: String,
    pub obligation_count: usize,
    pub datapoint_count: usize,
    pub ready: bool,
}

pub async fn evidence_pack_preview(
    State(state): State<Arc<AppState>>,
    Extension(tenant): Extension<TenantId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<EvidencePackPreview>, ApiError> {
    let record = run_for_tenant(&state, tenant, run_id).await?;
    let plan = record.plan.ok_or_else(|| not_found("compiled plan"))?;
    let datapoint_count = plan
        .obligations
        .iter()
        .flat_map(|o| o.datapoint_keys.iter())
        .count();
    Ok(Json(EvidencePackPreview {
        plan_hash: plan.plan_hash,
        obligation_count: plan.obligations.len(),
        datapoint_count,
        ready: record.evidence_pack.is_some(),
    }))
}

