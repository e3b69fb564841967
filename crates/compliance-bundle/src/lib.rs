// SPDX-License-Identifier: MIT OR Apache-2.0
//! Regulatory bundle schema and structural validation (C5).
//!
//! A [`Bundle`] is the unit of regulatory content the compiler (C6)
//! consumes: one regime/jurisdiction's obligations, datapoints, and
//! jurisdiction overlays. Bundles are validated structurally here — every
//! reference between obligations, datapoints, and overlays must resolve —
//! and checksummed via [`compliance_canon`] so a pinned `(bundle_id,
//! version)` always carries the same canonical checksum.
//!
//! Semantic validation of applicability expressions (whitelisted attribute
//! names, grammar) is the applicability evaluator's concern, not this
//! crate's — a bundle's `applicability` field is kept as opaque source text
//! here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_error::{ComplianceError, ErrorKind, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The regulatory regime a bundle implements, e.g. ESRS, CSRD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Regime {
    /// Stable regime code, e.g. `"ESRS"`.
    pub code: String,
    /// Human-readable name.
    pub name: String,
}

/// The shape of value a datapoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DatapointType {
    /// A numeric value with a unit.
    Numeric,
    /// Free text.
    Text,
    /// A yes/no value.
    Boolean,
    /// One of a controlled vocabulary of string values.
    Enum,
}

/// One disclosure datapoint an obligation requires.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Datapoint {
    /// Stable key, unique within the bundle, e.g. `"scope1_emissions_tco2e"`.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Expected value shape.
    pub datapoint_type: DatapointType,
    /// Whether a comparative baseline figure must also be assessed.
    pub requires_baseline: bool,
    /// Allowed unit strings, checked by the verifier. Empty for non-numeric
    /// datapoints.
    pub unit_vocabulary: Vec<String>,
}

/// A year from which an obligation's datapoints become mandatory, before
/// which they are evaluated but never downgrade coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PhaseIn {
    /// First reporting year the obligation is mandatory for.
    pub applies_from_year: u16,
}

/// A disclosure obligation: a set of datapoints gated by an applicability
/// expression and, optionally, a phase-in year.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Obligation {
    /// Stable code, unique within the bundle, e.g. `"E1-6"`.
    pub code: String,
    /// Report section this obligation belongs to, e.g. `"Climate"`.
    pub section: String,
    /// Keys of datapoints this obligation requires. Every key must exist in
    /// the bundle's `datapoints`.
    pub datapoint_keys: Vec<String>,
    /// Whether this obligation is mandatory (vs voluntary) once applicable.
    pub mandatory: bool,
    /// Source-language applicability expression, evaluated against the
    /// whitelisted company-profile context by the applicability evaluator.
    pub applicability: String,
    /// Phase-in year, if this obligation phases in over time.
    pub phase_in: Option<PhaseIn>,
}

/// One jurisdiction-specific modification to a bundle's base obligation
/// set, applied in `(jurisdiction, op_index)` order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OverlayOp {
    /// Add a jurisdiction-specific obligation.
    AddObligation {
        /// The obligation to add.
        obligation: Obligation,
    },
    /// Remove a base obligation by code.
    RemoveObligation {
        /// Code of the obligation to remove.
        obligation_code: String,
    },
    /// Replace the applicability expression of an existing obligation.
    ModifyApplicability {
        /// Code of the obligation to modify.
        obligation_code: String,
        /// Replacement applicability expression.
        applicability: String,
    },
}

/// A single overlay entry. `op_index` is the deterministic tie-break when
/// two overlays target the same jurisdiction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Overlay {
    /// Jurisdiction code this overlay applies under, e.g. `"DE"`.
    pub jurisdiction: String,
    /// Ordinal applied within `jurisdiction`, ascending.
    pub op_index: u32,
    /// The modification to apply.
    pub op: OverlayOp,
}

/// A complete, versioned regulatory bundle.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Bundle {
    /// Stable bundle identifier, e.g. `"esrs_mini"`.
    pub bundle_id: String,
    /// Bundle version, e.g. `"2026.01"`.
    pub version: String,
    /// Regime this bundle implements.
    pub regime: Regime,
    /// Base jurisdiction this bundle's un-overlaid obligations apply to.
    pub jurisdiction: String,
    /// Base obligation set, before overlays.
    pub obligations: Vec<Obligation>,
    /// Datapoints referenced by `obligations` and by any overlay.
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
    /// Jurisdiction-specific modifications.
    #[serde(default)]
    pub overlays: Vec<Overlay>,
    /// Identifiers of the source regulatory records this bundle was
    /// compiled from (for audit trail, never parsed or interpreted).
    #[serde(default)]
    pub source_record_ids: Vec<String>,
}

impl Bundle {
    /// Structural and referential validation. Does not evaluate or parse
    /// any applicability expression.
    ///
    /// # Errors
    ///
    /// `ErrorKind::Validation` on the first violation found: duplicate
    /// datapoint keys, duplicate obligation codes, an obligation
    /// referencing an unknown datapoint key, or an overlay targeting an
    /// obligation code absent from the base set.
    pub fn validate(&self) -> Result<()> {
        if self.bundle_id.is_empty() || self.version.is_empty() {
            return Err(ComplianceError::new(
                ErrorKind::Validation,
                "bundle_id and version must be non-empty",
            ));
        }

        let mut seen_keys = BTreeSet::new();
        for dp in &self.datapoints {
            if dp.key.is_empty() {
                return Err(ComplianceError::new(
                    ErrorKind::Validation,
                    "datapoint key must be non-empty",
                ));
            }
            if !seen_keys.insert(dp.key.as_str()) {
                return Err(ComplianceError::new(
                    ErrorKind::Validation,
                    "duplicate datapoint key",
                )
                .with_context("datapoint_key", &dp.key));
            }
        }

        let mut seen_codes = BTreeSet::new();
        for ob in &self.obligations {
            if ob.code.is_empty() {
                return Err(ComplianceError::new(
                    ErrorKind::Validation,
                    "obligation code must be non-empty",
                ));
            }
            if !seen_codes.insert(ob.code.as_str()) {
                return Err(ComplianceError::new(
                    ErrorKind::Validation,
                    "duplicate obligation code",
                )
                .with_context("obligation_code", &ob.code));
            }
            for key in &ob.datapoint_keys {
                if !seen_keys.contains(key.as_str()) {
                    return Err(ComplianceError::new(
                        ErrorKind::Validation,
                        "obligation references unknown datapoint key",
                    )
                    .with_context("obligation_code", &ob.code)
                    .with_context("datapoint_key", key));
                }
            }
        }

        for overlay in &self.overlays {
            match &overlay.op {
                OverlayOp::RemoveObligation { obligation_code }
                | OverlayOp::ModifyApplicability {
                    obligation_code, ..
                } => {
                    if !seen_codes.contains(obligation_code.as_str()) {
                        return Err(ComplianceError::new(
                            ErrorKind::Validation,
                            "overlay targets unknown obligation code",
                        )
                        .with_context("obligation_code", obligation_code)
                        .with_context("jurisdiction", &overlay.jurisdiction));
                    }
                }
                OverlayOp::AddObligation { obligation } => {
                    for key in &obligation.datapoint_keys {
                        if !seen_keys.contains(key.as_str()) {
                            return Err(ComplianceError::new(
                                ErrorKind::Validation,
                                "overlay-added obligation references unknown datapoint key",
                            )
                            .with_context("obligation_code", &obligation.code)
                            .with_context("datapoint_key", key));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Canonical checksum over the bundle payload, independent of field
    /// order or insertion order of maps anywhere in its structure.
    pub fn checksum(&self) -> Result<String> {
        compliance_canon::fingerprint(self)
            .map_err(|e| ComplianceError::new(ErrorKind::Validation, "failed to fingerprint bundle").with_source(e))
    }
}
