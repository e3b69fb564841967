// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Stable contract types for the compliance pipeline.

/// Assessment and extraction-diagnostic records.
pub mod assessment;
/// Document, page, and chunk records.
pub mod document;
/// Auto-discovery candidates and per-run event records.
pub mod events;
/// Run manifest and run-hash cache entry records.
pub mod manifest;
/// Obligation coverage roll-up records.
pub mod coverage;
/// Retrieval parameter records, replayable per datapoint.
pub mod retrieval;
/// Run lifecycle and company profile records.
pub mod run;

pub use assessment::{Assessment, AssessmentStatus, ExtractionDiagnostic, FailureReasonCode};
pub use coverage::{CoverageLevel, ObligationCoverage};
pub use document::{Chunk, CompanyDocumentLink, Document, Page};
pub use events::{CandidateDecision, DiscoveredCandidate, RunEvent};
pub use manifest::{RunCacheEntry, RunManifest};
pub use retrieval::RetrievalParams;
pub use run::{CompanyProfile, ListedStatus, Run, RunStatus};

/// Current contract version embedded in manifests and cache entries.
pub const CONTRACT_VERSION: &str = "compliance/v1";

/// Hex-encoded SHA-256 content hash of a document's raw bytes.
pub type DocHash = String;

/// Content-derived, stable chunk identifier (see [`document::Chunk::id_for`]).
pub type ChunkId = String;
