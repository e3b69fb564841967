// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the compliance pipeline.
//!
//! Every fallible pipeline operation returns a [`ComplianceError`], which
//! carries a stable [`ErrorKind`] (the taxonomy from the system's error
//! handling design), a human-readable message, and arbitrary structured
//! context. The kind alone determines HTTP status, CLI exit code, and
//! retry eligibility, so those policies live in one place.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad error kind, matching the taxonomy of kinds (not types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Request or bundle failed structural/semantic validation.
    Validation,
    /// Referenced entity does not exist (or is invisible to the caller).
    NotFound,
    /// Missing or invalid tenant credentials.
    Authz,
    /// Operation is not valid for the current lifecycle/readiness state.
    Conflict,
    /// Checksum/hash mismatch or orphan citation; always fatal to the run.
    Integrity,
    /// Storage, provider, or search client unavailable; retried locally.
    Dependency,
    /// Provider response did not conform to the required schema.
    ProviderSchema,
    /// An operation exceeded its deadline.
    Timeout,
    /// The run was cancelled by request.
    Cancelled,
    /// Compiled plan has zero applicable obligations.
    EmptyPlan,
    /// No chunks are available to retrieve against.
    EmptyCorpus,
}

impl ErrorKind {
    /// Stable `SCREAMING_SNAKE_CASE` code, embedded in API error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::Authz => "AUTHZ",
            Self::Conflict => "CONFLICT",
            Self::Integrity => "INTEGRITY",
            Self::Dependency => "DEPENDENCY",
            Self::ProviderSchema => "PROVIDER_SCHEMA",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::EmptyPlan => "EMPTY_PLAN",
            Self::EmptyCorpus => "EMPTY_CORPUS",
        }
    }

    /// `true` if a `Dependency`/`Timeout` failure is worth retrying locally
    /// with bounded backoff before it is surfaced.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Dependency | Self::Timeout)
    }

    /// `true` if this kind always aborts the enclosing run rather than
    /// downgrading a single datapoint to `Absent`.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::Integrity | Self::EmptyPlan | Self::EmptyCorpus)
    }

    /// Numeric HTTP status code this kind surfaces as at the API edge.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Authz => 401,
            Self::Conflict => 409,
            Self::Integrity => 500,
            Self::Dependency => 503,
            Self::ProviderSchema => 502,
            Self::Timeout => 504,
            Self::Cancelled => 409,
            Self::EmptyPlan => 422,
            Self::EmptyCorpus => 422,
        }
    }

    /// CLI exit code this kind maps to (see external CLI surface):
    /// `0` success (never returned here), `2` user error, `3` integrity
    /// failure, `4` dependency unavailable.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation | Self::NotFound | Self::Authz | Self::Conflict | Self::EmptyPlan
            | Self::EmptyCorpus | Self::ProviderSchema | Self::Cancelled => 2,
            Self::Integrity => 3,
            Self::Dependency | Self::Timeout => 4,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified compliance-pipeline error.
///
/// # Examples
///
/// ```
/// use compliance_error::{ComplianceError, ErrorKind};
///
/// let err = ComplianceError::new(ErrorKind::NotFound, "document not linked to company")
///     .with_context("doc_hash", "ab12");
/// assert_eq!(err.kind.http_status(), 404);
/// ```
pub struct ComplianceError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable, one-line explanation.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Structured diagnostic context (tenant id, run id, reason code, ...).
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ComplianceError {
    /// Construct a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key/value diagnostic. Serialization failures are skipped
    /// silently rather than panicking the error path.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause for the error chain.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Debug for ComplianceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ComplianceError");
        d.field("kind", &self.kind);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ComplianceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ComplianceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience alias used throughout the pipeline crates.
pub type Result<T> = std::result::Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Dependency.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }

    #[test]
    fn fatal_kinds() {
        assert!(ErrorKind::Integrity.is_fatal_to_run());
        assert!(ErrorKind::EmptyPlan.is_fatal_to_run());
        assert!(!ErrorKind::Dependency.is_fatal_to_run());
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorKind::Authz.http_status(), 401);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::Conflict.http_status(), 409);
    }

    #[test]
    fn exit_code_mapping() {
        assert_eq!(ErrorKind::Validation.exit_code(), 2);
        assert_eq!(ErrorKind::Integrity.exit_code(), 3);
        assert_eq!(ErrorKind::Dependency.exit_code(), 4);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = ComplianceError::new(ErrorKind::NotFound, "missing");
        assert_eq!(err.to_string(), "[NOT_FOUND] missing");
    }

    #[test]
    fn context_round_trips_through_json() {
        let err = ComplianceError::new(ErrorKind::Validation, "bad bundle")
            .with_context("bundle_id", "esrs_mini");
        assert_eq!(
            err.context.get("bundle_id"),
            Some(&serde_json::json!("esrs_mini"))
        );
    }
}
