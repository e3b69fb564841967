// SPDX-License-Identifier: MIT OR Apache-2.0
//! Assessment orchestrator (C10) and run-hash cache (C11).
//!
//! Drives the per-datapoint loop described by the run lifecycle: compile a
//! plan, fingerprint the run, short-circuit on a cache hit, otherwise fan
//! out retrieval/extraction/verification across the compiled plan's
//! datapoints, aggregate coverage, and package the evidence pack.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod hash;
mod pool;

pub use cache::{CachedRun, InMemoryRunCache, RunCache};
pub use hash::{compute_run_hash, RunHashInput};
pub use pool::WorkerPool;

use compliance_bundle::{Bundle, Datapoint};
use compliance_compiler::CompiledPlan;
use compliance_config::PipelineConfig;
use compliance_core::manifest::BundleRef;
use compliance_core::{
    Assessment, AssessmentStatus, Chunk, CompanyProfile, DocHash, ExtractionDiagnostic, Run,
    RunEvent, RunManifest, RunStatus,
};
use compliance_coverage::CoverageMatrix;
use compliance_error::{ComplianceError, ErrorKind, Result};
use compliance_provider::{ExtractionProvider, ExtractionRequest};
use compliance_telemetry::RunMetrics;
use compliance_verify::Candidate;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const CANCELLED_REASON: &str = "CANCELLED";

/// Cooperative cancellation flag, checked between fan-out batches.
///
/// This is not true mid-task interruption: an in-flight provider call is
/// always allowed to finish before a run honors a cancellation request,
/// matching "quiesced" in the lifecycle description rather than aborting
/// it outright.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything [`execute_run`] needs to drive one run to completion.
pub struct RunContext {
    /// Identifier assigned to this run.
    pub run_id: Uuid,
    /// Company profile the plan is compiled against.
    pub company_profile: CompanyProfile,
    /// Regulatory bundles selected for this run.
    pub bundles: Vec<Bundle>,
    /// Candidate chunks available for retrieval.
    pub chunks: Vec<Chunk>,
    /// Source document bytes, keyed by `doc_hash`.
    pub documents: Vec<(DocHash, Vec<u8>)>,
    /// Extraction provider used for every datapoint in this run.
    pub provider: Arc<dyn ExtractionProvider>,
    /// Tunable pipeline parameters.
    pub config: PipelineConfig,
    /// How the compiler was invoked, e.g. `"standard"`.
    pub compiler_mode: String,
    /// Code version (e.g. git SHA) producing this run.
    pub code_version: String,
    /// Prompt template version used to build extraction prompts.
    pub prompt_template_version: String,
    /// Report template version used to render human-facing output.
    pub report_template_version: String,
    /// Cooperative cancellation flag for this run.
    pub cancellation: CancellationToken,
    /// Maximum datapoints assessed concurrently.
    pub worker_concurrency: usize,
}

/// Everything [`execute_run`] produces.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The run record, in its final lifecycle state.
    pub run: Run,
    /// Every persisted assessment, in plan order.
    pub assessments: Vec<Assessment>,
    /// Every persisted diagnostic, in plan order.
    pub diagnostics: Vec<ExtractionDiagnostic>,
    /// The run's manifest. `None` only for a cancelled run.
    pub manifest: Option<RunManifest>,
    /// The run's coverage matrix. `None` only for a cancelled run.
    pub coverage: Option<CoverageMatrix>,
    /// The built evidence pack bytes. `None` only for a cancelled run.
    pub evidence_pack: Option<Vec<u8>>,
    /// In-process metrics collected while iterating the plan.
    pub metrics: RunMetrics,
    /// `true` if this outcome was returned verbatim from the cache without
    /// any provider calls.
    pub from_cache: bool,
    /// The per-stage event record, surfaced by `run diagnose` (§6.6) and
    /// `GET /runs/{id}/events`. Empty only for a cache hit that predates
    /// this field (never produced going forward).
    pub events: Vec<RunEvent>,
}

/// Accumulates a run's per-stage event record with a monotonic `seq`.
struct EventLog {
    run_id: Uuid,
    next_seq: u64,
    events: Vec<RunEvent>,
}

impl EventLog {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            next_seq: 0,
            events: Vec::new(),
        }
    }

    fn push(&mut self, stage: &str, message: impl Into<String>) {
        self.events.push(RunEvent {
            run_id: self.run_id,
            seq: self.next_seq,
            stage: stage.to_string(),
            message: message.into(),
            at: chrono::Utc::now(),
        });
        self.next_seq += 1;
    }

    fn into_events(self) -> Vec<RunEvent> {
        self.events
    }
}

fn retrieval_params_from(config: &PipelineConfig) -> compliance_core::RetrievalParams {
    compliance_core::RetrievalParams {
        top_k: config.retrieval.top_k,
        lexical_weight: config.retrieval.lexical_weight,
        vector_weight: config.retrieval.vector_weight,
        normalization_mode: "bm25".to_string(),
    }
}

fn ordered_unique_datapoint_keys(plan: &CompiledPlan) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for obligation in &plan.obligations {
        for key in &obligation.datapoint_keys {
            if seen.insert(key.clone()) {
                ordered.push(key.clone());
            }
        }
    }
    ordered
}

fn datapoint_catalog(bundles: &[Bundle]) -> HashMap<String, Datapoint> {
    let mut catalog = HashMap::new();
    for bundle in bundles {
        for dp in &bundle.datapoints {
            catalog.entry(dp.key.clone()).or_insert_with(|| dp.clone());
        }
    }
    catalog
}

fn known_sections(bundles: &[Bundle]) -> Vec<String> {
    let mut sections: BTreeSet<String> = BTreeSet::new();
    for bundle in bundles {
        for ob in &bundle.obligations {
            sections.insert(ob.section.clone());
        }
    }
    sections.into_iter().collect()
}

/// Retrieve, extract, verify, and diagnose a single datapoint.
///
/// A provider error is never propagated to the caller: it is recorded as
/// an `Absent` candidate so one misbehaving datapoint cannot abort the
/// whole run. Returns `(assessment, diagnostic, had_failure)`, where
/// `had_failure` folds together provider errors and verification
/// downgrades for the run's failure-rate metric.
async fn assess_datapoint(
    run_id: Uuid,
    datapoint_key: String,
    datapoint: Datapoint,
    chunks: Arc<Vec<Chunk>>,
    provider: Arc<dyn ExtractionProvider>,
    retrieval_params: compliance_core::RetrievalParams,
    prompt_template_version: String,
) -> (Assessment, ExtractionDiagnostic, bool) {
    let retrieval = compliance_retrieve::retrieve(
        &chunks,
        &datapoint.label,
        None,
        &retrieval_params,
    );

    let request = ExtractionRequest {
        datapoint_key: datapoint_key.clone(),
        datapoint_label: datapoint.label.clone(),
        requires_baseline: datapoint.requires_baseline,
        unit_vocabulary: datapoint.unit_vocabulary.clone(),
        chunks: retrieval.results.iter().map(|sc| sc.chunk.clone()).collect(),
        prompt_template_version: prompt_template_version.clone(),
    };

    let mut provider_failed = false;
    let response = match provider.extract(&request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                run_id = %run_id,
                datapoint_key = %datapoint_key,
                error = %err,
                "provider call failed; recording as absent"
            );
            provider_failed = true;
            compliance_provider::ExtractionResponse {
                status: AssessmentStatus::Absent,
                value: None,
                unit: None,
                year: None,
                baseline_year: None,
                baseline_value: None,
                rationale: format!("provider call failed: {err}"),
                evidence_chunk_ids: Vec::new(),
            }
        }
    };

    let gated = compliance_provider::enforce_evidence_gating(response, &request);
    let prompt_hash = compliance_provider::prompt_hash(&request).unwrap_or_default();

    let candidate = Candidate {
        status: gated.status,
        value: gated.value,
        unit: gated.unit,
        year: gated.year,
        baseline_year: gated.baseline_year,
        baseline_value: gated.baseline_value,
        rationale: gated.rationale,
        evidence_chunk_ids: gated.evidence_chunk_ids,
    };

    let outcome = compliance_verify::verify(candidate, &datapoint, &request.chunks);

    let assessment = Assessment {
        run_id,
        datapoint_key: datapoint_key.clone(),
        status: outcome.candidate.status,
        value: outcome.candidate.value,
        unit: outcome.candidate.unit,
        year: outcome.candidate.year,
        baseline_year: outcome.candidate.baseline_year,
        baseline_value: outcome.candidate.baseline_value,
        rationale: outcome.candidate.rationale,
        evidence_chunk_ids: outcome.candidate.evidence_chunk_ids,
        prompt_hash,
        retrieval_params: retrieval.applied_params,
    };

    let diagnostic = ExtractionDiagnostic {
        run_id,
        datapoint_key,
        retrieved_chunk_ids: request.available_chunk_ids(),
        numeric_matches_found: outcome.numeric_matches_found,
        verification_status: outcome.verification_status,
        failure_reason_code: outcome.failure_reason_code,
    };

    let had_failure = provider_failed || diagnostic.failure_reason_code.is_some();
    (assessment, diagnostic, had_failure)
}

/// Drive one run from a compiled plan through to a completed (or
/// cancelled) [`RunOutcome`].
///
/// # Errors
///
/// Propagates `ErrorKind::EmptyPlan` if `ctx.bundles` compiles to zero
/// applicable obligations, `ErrorKind::EmptyCorpus` if the plan is
/// non-empty but no chunks are available on a cache miss, or any
/// `ErrorKind::Integrity` failure while fingerprinting or packaging.
pub async fn execute_run(ctx: RunContext, cache: &dyn RunCache) -> Result<RunOutcome> {
    let run_span = compliance_telemetry::run_span(ctx.run_id);
    async move {
        let started = Instant::now();
        let mut log = EventLog::new(ctx.run_id);
        let plan = compliance_compiler::compile(&ctx.bundles, &ctx.company_profile)?;
        log.push("compile", format!("compiled plan with {} obligations", plan.obligations.len()));

        let mut document_hashes: Vec<String> =
            ctx.documents.iter().map(|(hash, _)| hash.clone()).collect();
        document_hashes.sort();
        document_hashes.dedup();

        let retrieval_params = retrieval_params_from(&ctx.config);
        let run_hash = compute_run_hash(&RunHashInput {
            document_hashes: &document_hashes,
            company_profile: &ctx.company_profile,
            bundle_refs: &plan.bundle_refs,
            compiler_mode: &ctx.compiler_mode,
            retrieval_params: &retrieval_params,
            provider_identity: ctx.provider.identity(),
            prompt_template_version: &ctx.prompt_template_version,
            code_version: &ctx.code_version,
        })?;

        log.push("cache_lookup", format!("checking run_hash={run_hash}"));
        if let Some(cached) = cache.get(&run_hash).await {
            tracing::info!(run_id = %ctx.run_id, %run_hash, "cache hit; returning stored run");
            return Ok(RunOutcome {
                run: cached.run,
                assessments: cached.assessments,
                diagnostics: cached.diagnostics,
                manifest: Some(cached.manifest),
                coverage: Some(cached.coverage),
                evidence_pack: Some(cached.evidence_pack),
                metrics: RunMetrics {
                    run_id: Some(ctx.run_id),
                    ..RunMetrics::default()
                },
                from_cache: true,
                events: cached.events,
            });
        }

        if ctx.chunks.is_empty() {
            return Err(ComplianceError::new(
                ErrorKind::EmptyCorpus,
                "compiled plan is non-empty but no chunks are available to retrieve against",
            )
            .with_context("run_id", ctx.run_id.to_string()));
        }

        let datapoint_keys = ordered_unique_datapoint_keys(&plan);
        let catalog = Arc::new(datapoint_catalog(&ctx.bundles));
        let chunks = Arc::new(ctx.chunks.clone());
        let pool = WorkerPool::new(ctx.worker_concurrency);

        let run_id = ctx.run_id;
        let provider = Arc::clone(&ctx.provider);
        let prompt_template_version_for_pool = ctx.prompt_template_version.clone();
        let retrieval_params_for_pool = retrieval_params.clone();

        let results = pool
            .run_ordered(datapoint_keys, move |key| {
                let chunks = Arc::clone(&chunks);
                let provider = Arc::clone(&provider);
                let catalog = Arc::clone(&catalog);
                let retrieval_params = retrieval_params_for_pool.clone();
                let prompt_template_version = prompt_template_version_for_pool.clone();
                async move {
                    let datapoint = catalog
                        .get(&key)
                        .cloned()
                        .expect("datapoint key referenced by compiled plan must exist in a bundle's datapoints");
                    assess_datapoint(
                        run_id,
                        key.clone(),
                        datapoint,
                        chunks,
                        provider,
                        retrieval_params,
                        prompt_template_version,
                    )
                    .instrument(compliance_telemetry::datapoint_span(run_id, &key, "assess"))
                    .await
                }
            })
            .await;

        log.push("assess", format!("assessed {} datapoints", results.len()));

        let mut assessments = Vec::with_capacity(results.len());
        let mut diagnostics = Vec::with_capacity(results.len());
        let mut downgraded = 0u64;
        for (assessment, diagnostic, had_failure) in results {
            if had_failure {
                downgraded += 1;
            }
            assessments.push(assessment);
            diagnostics.push(diagnostic);
        }

        let metrics = RunMetrics {
            run_id: Some(ctx.run_id),
            datapoints_total: assessments.len() as u64,
            datapoints_downgraded: downgraded,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if ctx.cancellation.is_cancelled() {
            tracing::warn!(run_id = %ctx.run_id, "run cancelled after in-flight datapoints quiesced");
            log.push("cancel", "run cancelled after in-flight datapoints quiesced");
            let run = Run {
                run_id: ctx.run_id,
                tenant_id: ctx.company_profile.tenant_id,
                company_id: ctx.company_profile.company_id,
                status: RunStatus::Failed,
                compiler_mode: ctx.compiler_mode.clone(),
                provider_id: ctx.provider.identity().to_string(),
                run_hash,
                failure_reason: Some(CANCELLED_REASON.to_string()),
            };
            return Ok(RunOutcome {
                run,
                assessments,
                diagnostics,
                manifest: None,
                coverage: None,
                evidence_pack: None,
                metrics,
                from_cache: false,
                events: log.into_events(),
            });
        }

        let sections = known_sections(&ctx.bundles);
        let coverage = compliance_coverage::build_coverage_matrix(&plan, &assessments, &sections);
        log.push("coverage", "coverage matrix built");

        let status = if metrics.failure_rate() > ctx.config.diagnostics.failure_rate_threshold {
            RunStatus::IntegrityWarning
        } else {
            RunStatus::Completed
        };

        let manifest = RunManifest {
            run_id: ctx.run_id,
            document_hashes,
            bundle_refs: plan
                .bundle_refs
                .iter()
                .map(|(bundle_id, version, checksum)| BundleRef {
                    bundle_id: bundle_id.clone(),
                    version: version.clone(),
                    checksum: checksum.clone(),
                })
                .collect(),
            plan_hash: plan.plan_hash.clone(),
            retrieval_params,
            provider_identity: ctx.provider.identity().to_string(),
            prompt_template_version: ctx.prompt_template_version.clone(),
            code_version: ctx.code_version.clone(),
            report_template_version: ctx.report_template_version.clone(),
            run_hash: run_hash.clone(),
        };

        let evidence_pack = compliance_manifest::build_evidence_pack(&compliance_manifest::EvidencePackInput {
            manifest: &manifest,
            plan: &plan,
            coverage: &coverage,
            assessments: &assessments,
            evidence_chunks: &ctx.chunks,
            documents: &ctx.documents,
        })?;
        compliance_manifest::verify_evidence_pack(&evidence_pack)?;
        log.push("package", "manifest and evidence pack built");

        let run = Run {
            run_id: ctx.run_id,
            tenant_id: ctx.company_profile.tenant_id,
            company_id: ctx.company_profile.company_id,
            status,
            compiler_mode: ctx.compiler_mode.clone(),
            provider_id: ctx.provider.identity().to_string(),
            run_hash: run_hash.clone(),
            failure_reason: None,
        };

        let events = log.into_events();
        cache
            .put(
                run_hash,
                CachedRun {
                    run: run.clone(),
                    manifest: manifest.clone(),
                    assessments: assessments.clone(),
                    diagnostics: diagnostics.clone(),
                    coverage: coverage.clone(),
                    evidence_pack: evidence_pack.clone(),
                    events: events.clone(),
                },
            )
            .await;

        Ok(RunOutcome {
            run,
            assessments,
            diagnostics,
            manifest: Some(manifest),
            coverage: Some(coverage),
            evidence_pack: Some(evidence_pack),
            metrics,
            from_cache: false,
            events,
        })
    }
    .instrument(run_span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_bundle::{DatapointType, Obligation, Regime};
    use compliance_core::ListedStatus;
    use compliance_provider::{ExtractionResponse, FallbackProvider};
    use std::sync::atomic::AtomicU32;

    fn profile() -> CompanyProfile {
        CompanyProfile {
            tenant_id: Uuid::nil(),
            company_id: Uuid::nil(),
            name: "Acme".to_string(),
            employees: 500,
            turnover: 60_000_000.0,
            listed_status: ListedStatus::Listed,
            reporting_year: 2026,
            reporting_year_start: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            reporting_year_end: chrono::NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            jurisdictions: vec!["DE".to_string()],
            regimes: vec!["ESRS".to_string()],
        }
    }

    fn bundle() -> Bundle {
        Bundle {
            bundle_id: "esrs_mini".to_string(),
            version: "2026.01".to_string(),
            regime: Regime {
                code: "ESRS".to_string(),
                name: "ESRS".to_string(),
            },
            jurisdiction: "EU".to_string(),
            obligations: vec![
                Obligation {
                    code: "E1-1".to_string(),
                    section: "Climate".to_string(),
                    datapoint_keys: vec!["scope1".to_string()],
                    mandatory: true,
                    applicability: "employees >= 250".to_string(),
                    phase_in: None,
                },
                Obligation {
                    code: "E1-6".to_string(),
                    section: "Climate".to_string(),
                    datapoint_keys: vec!["scope2".to_string()],
                    mandatory: true,
                    applicability: "employees >= 250".to_string(),
                    phase_in: None,
                },
            ],
            datapoints: vec![
                Datapoint {
                    key: "scope1".to_string(),
                    label: "scope 1 emissions".to_string(),
                    datapoint_type: DatapointType::Numeric,
                    requires_baseline: false,
                    unit_vocabulary: vec!["tCO2e".to_string()],
                },
                Datapoint {
                    key: "scope2".to_string(),
                    label: "scope 2 emissions".to_string(),
                    datapoint_type: DatapointType::Numeric,
                    requires_baseline: false,
                    unit_vocabulary: vec!["tCO2e".to_string()],
                },
            ],
            overlays: vec![],
            source_record_ids: vec![],
        }
    }

    fn chunk(id: &str, doc_hash: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_hash: doc_hash.to_string(),
            page_number: 1,
            start_offset: 0,
            end_offset: text.len(),
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            embedding: None,
        }
    }

    fn base_ctx(chunks: Vec<Chunk>, provider: Arc<dyn ExtractionProvider>) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            company_profile: profile(),
            bundles: vec![bundle()],
            chunks,
            documents: vec![("AB01".to_string(), b"irrelevant pdf bytes".to_vec())],
            provider,
            config: PipelineConfig::default(),
            compiler_mode: "standard".to_string(),
            code_version: "0000000".to_string(),
            prompt_template_version: "v1".to_string(),
            report_template_version: "v1".to_string(),
            cancellation: CancellationToken::new(),
            worker_concurrency: 4,
        }
    }

    #[tokio::test]
    async fn fallback_provider_yields_absent_assessments_without_matching_text() {
        let cache = InMemoryRunCache::new();
        let chunks = vec![chunk("c1", "AB01", "unrelated filler about weather")];
        let ctx = base_ctx(chunks, Arc::new(FallbackProvider));
        let outcome = execute_run(ctx, &cache).await.unwrap();
        assert_eq!(outcome.assessments.len(), 2);
        assert!(outcome.assessments.iter().all(|a| a.status == AssessmentStatus::Absent));
        assert_eq!(outcome.run.status, RunStatus::IntegrityWarning);
        assert!(!outcome.from_cache);
    }

    #[tokio::test]
    async fn fallback_candidate_is_absent_even_with_matching_text() {
        let cache = InMemoryRunCache::new();
        let chunks = vec![
            chunk("c1", "AB01", "scope 1 emissions were 120.0 tCO2e in the period"),
            chunk("c2", "AB01", "scope 2 emissions were 80.0 tCO2e in the period"),
        ];
        let ctx = base_ctx(chunks, Arc::new(FallbackProvider));
        let outcome = execute_run(ctx, &cache).await.unwrap();
        let scope1 = outcome
            .assessments
            .iter()
            .find(|a| a.datapoint_key == "scope1")
            .unwrap();
        assert_eq!(scope1.status, AssessmentStatus::Absent);
        assert!(scope1.evidence_chunk_ids.is_empty());
    }

    #[tokio::test]
    async fn empty_corpus_on_cache_miss_is_rejected() {
        let cache = InMemoryRunCache::new();
        let ctx = base_ctx(vec![], Arc::new(FallbackProvider));
        let err = execute_run(ctx, &cache).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyCorpus);
    }

    #[tokio::test]
    async fn non_applicable_company_fails_preflight_with_empty_plan() {
        let cache = InMemoryRunCache::new();
        let mut ctx = base_ctx(vec![chunk("c1", "AB01", "some text")], Arc::new(FallbackProvider));
        ctx.company_profile.employees = 1;
        let err = execute_run(ctx, &cache).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyPlan);
    }

    #[tokio::test]
    async fn second_run_with_identical_inputs_is_served_from_cache() {
        struct CountingProvider {
            calls: AtomicU32,
        }
        #[async_trait::async_trait]
        impl ExtractionProvider for CountingProvider {
            fn identity(&self) -> &str {
                "counting-fallback"
            }
            async fn extract(
                &self,
                request: &ExtractionRequest,
            ) -> Result<ExtractionResponse> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                FallbackProvider.extract(request).await
            }
        }

        let cache = InMemoryRunCache::new();
        let provider = Arc::new(CountingProvider { calls: AtomicU32::new(0) });
        let chunks = vec![chunk("c1", "AB01", "scope 1 emissions were 120.0 tCO2e")];

        let run_id = Uuid::new_v4();
        let mut first_ctx = base_ctx(chunks.clone(), provider.clone() as Arc<dyn ExtractionProvider>);
        first_ctx.run_id = run_id;
        let first = execute_run(first_ctx, &cache).await.unwrap();
        assert!(!first.from_cache);
        let calls_after_first = provider.calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        let mut second_ctx = base_ctx(chunks, provider.clone() as Arc<dyn ExtractionProvider>);
        second_ctx.run_id = run_id;
        let second = execute_run(second_ctx, &cache).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
        assert_eq!(second.run.run_hash, first.run.run_hash);
    }

    #[tokio::test]
    async fn cancellation_quiesces_and_skips_manifest_and_cache_write() {
        let cache = InMemoryRunCache::new();
        let chunks = vec![chunk("c1", "AB01", "scope 1 emissions were 120.0 tCO2e")];
        let mut ctx = base_ctx(chunks, Arc::new(FallbackProvider));
        ctx.cancellation.cancel();
        let run_hash_ctx_run_id = ctx.run_id;
        let outcome = execute_run(ctx, &cache).await.unwrap();
        assert_eq!(outcome.run.status, RunStatus::Failed);
        assert_eq!(outcome.run.failure_reason.as_deref(), Some("CANCELLED"));
        assert!(outcome.manifest.is_none());
        assert!(outcome.coverage.is_none());
        assert!(outcome.evidence_pack.is_none());
        assert!(!outcome.assessments.is_empty());
        assert!(cache.get(&outcome.run.run_hash).await.is_none());
        let _ = run_hash_ctx_run_id;
    }
}
