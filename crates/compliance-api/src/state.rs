// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared in-memory application state.
//!
//! Every registry here mirrors the shape of the pipeline crates' own
//! in-memory stores (`Arc<RwLock<HashMap<...>>>`, keyed by the natural
//! identifier, never by insertion order). A real deployment would swap
//! these for the relational store described in §1; nothing in the handler
//! layer depends on the in-memory shape.

use async_trait::async_trait;
use compliance_bundle::Bundle;
use compliance_compiler::CompiledPlan;
use compliance_config::PipelineConfig;
use compliance_core::{Assessment, CompanyProfile, ExtractionDiagnostic, Run, RunEvent, RunManifest};
use compliance_coverage::CoverageMatrix;
use compliance_orchestrator::{InMemoryRunCache, RunCache};
use compliance_store::DocumentStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A lead surfaced by document auto-discovery: the web-search client
/// itself is out of scope, so this trait is the pipeline's only contract
/// with it — a source of already-fetched `(url, title, snippet, bytes)`
/// candidates, never a thing that reaches the network on our behalf.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Return up to `max_documents` candidates for `company`.
    async fn discover(&self, company: &CompanyProfile, max_documents: usize) -> Vec<CandidateLead>;
}

/// One candidate document handed back by a [`CandidateSource`].
#[derive(Debug, Clone)]
pub struct CandidateLead {
    /// Source URL, carried through into the response for audit purposes.
    pub url: String,
    /// Page title, as reported by the search client.
    pub title: String,
    /// Snippet, as reported by the search client.
    pub snippet: String,
    /// MIME content type of `bytes`, as declared by the search client.
    pub content_type: String,
    /// The candidate's raw bytes, already fetched.
    pub bytes: Vec<u8>,
}

/// Deterministic, zero-external-call [`CandidateSource`]: the default
/// until a real web-search client is wired in. Always returns no leads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCandidateSource;

#[async_trait]
impl CandidateSource for NullCandidateSource {
    async fn discover(&self, _company: &CompanyProfile, _max_documents: usize) -> Vec<CandidateLead> {
        Vec::new()
    }
}

/// Everything known about one run, as tracked by the API layer across its
/// `queued -> ... -> terminal` lifecycle. Populated incrementally: only
/// `run` is present immediately after `POST /runs`; the rest fill in once
/// `POST /runs/{id}/execute` completes.
#[derive(Debug, Clone)]
pub struct RunRecord {
    /// The run record in its current lifecycle state.
    pub run: Run,
    /// The compiled plan this run was (or will be) assessed against.
    pub plan: Option<CompiledPlan>,
    /// Persisted assessments, once the run has executed.
    pub assessments: Vec<Assessment>,
    /// Persisted diagnostics, once the run has executed.
    pub diagnostics: Vec<ExtractionDiagnostic>,
    /// The per-stage event record, once the run has executed.
    pub events: Vec<RunEvent>,
    /// The run's manifest, once execution completes.
    pub manifest: Option<RunManifest>,
    /// The run's coverage matrix, once execution completes.
    pub coverage: Option<CoverageMatrix>,
    /// The built evidence pack bytes, once execution completes.
    pub evidence_pack: Option<Vec<u8>>,
}

/// Shared state handed to every Axum handler via `State`.
pub struct AppState {
    /// Content-addressed document store (C1).
    pub document_store: Arc<dyn DocumentStore>,
    /// Company profiles, keyed by `company_id`.
    pub companies: Arc<RwLock<HashMap<Uuid, CompanyProfile>>>,
    /// Loaded regulatory bundles, keyed by `(bundle_id, version)`.
    pub bundles: Arc<RwLock<HashMap<(String, String), Bundle>>>,
    /// Runs, keyed by `run_id`.
    pub runs: Arc<RwLock<HashMap<Uuid, RunRecord>>>,
    /// Run-hash cache shared with the orchestrator (C11).
    pub run_cache: Arc<dyn RunCache>,
    /// Tunable pipeline parameters.
    pub config: PipelineConfig,
    /// `api_key -> tenant_id`, the whole of this deployment's auth store.
    pub tenants: HashMap<String, Uuid>,
    /// Document auto-discovery source.
    pub candidate_source: Arc<dyn CandidateSource>,
    /// Code version (e.g. git SHA) stamped into every manifest.
    pub code_version: String,
    /// Prompt template version stamped into every manifest.
    pub prompt_template_version: String,
    /// Report template version stamped into every manifest.
    pub report_template_version: String,
    /// Maximum datapoints assessed concurrently per run.
    pub worker_concurrency: usize,
    /// Root directory this deployment persists run artifacts under —
    /// `<data_dir>/runs/<run_id>/events.jsonl`, `<data_dir>/companies/<id>.json`
    /// — the same on-disk layout `compliance-cli` reads directly, so the two
    /// front-ends agree on where state lives without a network hop between
    /// them.
    pub data_dir: PathBuf,
}

impl AppState {
    /// Construct state for a single-tenant development deployment:
    /// `tenant_id` is the only tenant, `api_key` its one credential.
    pub fn new_single_tenant(
        document_store: Arc<dyn DocumentStore>,
        config: PipelineConfig,
        tenant_id: Uuid,
        api_key: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut tenants = HashMap::new();
        tenants.insert(api_key.into(), tenant_id);
        Self {
            document_store,
            companies: Arc::new(RwLock::new(HashMap::new())),
            bundles: Arc::new(RwLock::new(HashMap::new())),
            runs: Arc::new(RwLock::new(HashMap::new())),
            run_cache: Arc::new(InMemoryRunCache::new()),
            config,
            tenants,
            candidate_source: Arc::new(NullCandidateSource),
            code_version: "0000000".to_string(),
            prompt_template_version: "v1".to_string(),
            report_template_version: "v1".to_string(),
            worker_concurrency: 4,
            data_dir: data_dir.into(),
        }
    }
}
