// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run manifest and run-hash cache entry records (data model §3; §4.11, §4.12).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a pinned bundle, as recorded in the manifest and folded
/// into the run hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BundleRef {
    /// Bundle identifier.
    pub bundle_id: String,
    /// Bundle version.
    pub version: String,
    /// Canonical checksum of the bundle payload.
    pub checksum: String,
}

/// All fingerprints needed to re-derive a completed run's result, written
/// once at run completion and never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunManifest {
    /// Run this manifest describes.
    pub run_id: uuid::Uuid,
    /// Content hashes of every document the run drew evidence from.
    pub document_hashes: Vec<String>,
    /// Bundles selected for this run.
    pub bundle_refs: Vec<BundleRef>,
    /// Hash of the compiled plan.
    pub plan_hash: String,
    /// Retrieval parameters applied uniformly across the run (per-datapoint
    /// overrides, if any, live in the diagnostics).
    pub retrieval_params: crate::RetrievalParams,
    /// Extraction provider identity (name + model + prompt template fingerprint).
    pub provider_identity: String,
    /// Version of the prompt template used to build extraction prompts.
    pub prompt_template_version: String,
    /// Code version (e.g. git SHA) that produced this run.
    pub code_version: String,
    /// Version of the report template used to render human-facing output.
    pub report_template_version: String,
    /// The canonical run fingerprint this manifest corresponds to.
    pub run_hash: String,
}

impl RunManifest {
    /// Testable property 5: every fingerprint is present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.plan_hash.is_empty()
            && !self.provider_identity.is_empty()
            && !self.prompt_template_version.is_empty()
            && !self.code_version.is_empty()
            && !self.report_template_version.is_empty()
            && !self.run_hash.is_empty()
            && self.bundle_refs.iter().all(|b| !b.checksum.is_empty())
    }
}

/// Cache entry keyed solely by `run_hash` (§4.11). Write-once: a second
/// concurrent completion with the same `run_hash` is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunCacheEntry {
    /// The canonical run fingerprint this entry is keyed by.
    pub run_hash: String,
    /// Reference to the stored manifest (e.g. a run ID to look it up by).
    pub manifest_ref: uuid::Uuid,
    /// Reference to the stored assessments.
    pub assessments_ref: uuid::Uuid,
    /// Reference to the stored coverage matrix.
    pub coverage_ref: uuid::Uuid,
}
