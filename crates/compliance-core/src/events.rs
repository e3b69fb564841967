// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document auto-discovery results and per-run event records (ambient
//! additions; see SPEC_FULL.md §3).

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of an auto-discovered document candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CandidateDecision {
    /// The candidate was fetched and ingested into the document store.
    Ingested,
    /// The candidate was rejected before ingestion.
    Rejected,
}

/// One row returned by `POST /documents/auto-discover`. The web-search
/// client that produces `(url, title, snippet)` tuples is an external
/// collaborator (out of scope); this type only models the decision the
/// pipeline made about a candidate it was handed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveredCandidate {
    /// Source URL.
    pub url: String,
    /// Page title, as reported by the search client.
    pub title: String,
    /// Snippet, as reported by the search client.
    pub snippet: String,
    /// Whether this candidate was ingested or rejected.
    pub decision: CandidateDecision,
    /// Reason code, populated when `decision == Rejected`.
    pub reason: Option<String>,
}

/// A single per-stage event in a run's event log, surfaced by `run
/// diagnose` (§6.6) and `GET /runs/{id}/diagnostics`. Ordered by `seq`
/// ascending — never by wall-clock — so replay is deterministic even when
/// stages ran concurrently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunEvent {
    /// Owning run.
    pub run_id: uuid::Uuid,
    /// Monotonic sequence number, unique within the run.
    pub seq: u64,
    /// Pipeline stage that emitted this event, e.g. `"retrieve"`, `"extract"`.
    pub stage: String,
    /// Human-readable message.
    pub message: String,
    /// Wall-clock time the event was recorded (informational only — never
    /// used for ordering).
    pub at: DateTime<Utc>,
}
