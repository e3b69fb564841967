// SPDX-License-Identifier: MIT OR Apache-2.0
//! Regulatory compiler (C6): bundle selection, overlay application,
//! applicability filtering, phase-in evaluation, and `plan_hash`.

use crate::applicability;
use compliance_bundle::{Bundle, Obligation, OverlayOp};
use compliance_core::CompanyProfile;
use compliance_error::{ComplianceError, ErrorKind, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One obligation as it survives overlay application and applicability
/// filtering, with its mandatory status adjusted for phase-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompiledObligation {
    /// Obligation code.
    pub code: String,
    /// Report section.
    pub section: String,
    /// Datapoint keys, sorted ascending.
    pub datapoint_keys: Vec<String>,
    /// Whether this obligation counts toward mandatory coverage for this
    /// run — `false` when the obligation is voluntary or has not yet
    /// phased in for `reporting_year`.
    pub mandatory: bool,
    /// Bundle this obligation was sourced from.
    pub source_bundle_id: String,
}

/// An obligation that did not survive applicability filtering, recorded
/// with the reason it was dropped instead of being silently omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExcludedObligation {
    /// Obligation code.
    pub code: String,
    /// Bundle this obligation was sourced from.
    pub source_bundle_id: String,
    /// Why the obligation was excluded, e.g. `NOT_APPLICABLE`.
    pub reason_code: String,
}

/// A datapoint excluded from an otherwise-applicable obligation because its
/// phase-in year has not yet arrived for `reporting_year`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExcludedDatapoint {
    /// Obligation the datapoint belongs to.
    pub obligation_code: String,
    /// Datapoint key.
    pub datapoint_key: String,
    /// Always `PHASE_IN` today; kept as a string so future exclusion
    /// reasons don't require a schema migration.
    pub reason_code: String,
}

/// A fully compiled, ordered regulatory plan for one run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompiledPlan {
    /// Bundles selected for this run, `(bundle_id, version, checksum)`.
    pub bundle_refs: Vec<(String, String, String)>,
    /// Obligations surviving overlay application and applicability
    /// filtering, sorted by `code` ascending.
    pub obligations: Vec<CompiledObligation>,
    /// Obligations dropped by applicability filtering, with reason codes.
    pub excluded_obligations: Vec<ExcludedObligation>,
    /// Datapoints dropped by phase-in evaluation, with reason codes.
    pub excluded_datapoints: Vec<ExcludedDatapoint>,
    /// Canonical fingerprint of everything above. Empty until
    /// [`compile`] finishes; never recomputed afterward.
    pub plan_hash: String,
}

#[derive(Serialize)]
struct PlanFingerprintInput<'a> {
    bundle_refs: &'a [(String, String, String)],
    obligations: &'a [CompiledObligation],
    excluded_obligations: &'a [ExcludedObligation],
    excluded_datapoints: &'a [ExcludedDatapoint],
}

/// Compile `bundles` against `profile`, producing the ordered plan this
/// run will assess.
///
/// # Errors
///
/// Propagates any bundle validation or applicability-expression error.
/// `ErrorKind::EmptyPlan` if zero obligations survive filtering — a run
/// can never proceed against an empty plan.
pub fn compile(bundles: &[Bundle], profile: &CompanyProfile) -> Result<CompiledPlan> {
    for bundle in bundles {
        bundle.validate()?;
    }

    let mut bundle_refs = Vec::new();
    let mut obligations: BTreeMap<String, (Obligation, String)> = BTreeMap::new();

    for bundle in bundles {
        bundle_refs.push((
            bundle.bundle_id.clone(),
            bundle.version.clone(),
            bundle.checksum()?,
        ));

        for ob in &bundle.obligations {
            obligations.insert(ob.code.clone(), (ob.clone(), bundle.bundle_id.clone()));
        }

        let mut applicable_overlays: Vec<&compliance_bundle::Overlay> = bundle
            .overlays
            .iter()
            .filter(|o| profile.jurisdictions.iter().any(|j| j == &o.jurisdiction))
            .collect();
        applicable_overlays.sort_by(|a, b| {
            a.jurisdiction
                .cmp(&b.jurisdiction)
                .then(a.op_index.cmp(&b.op_index))
        });

        for overlay in applicable_overlays {
            match &overlay.op {
                OverlayOp::AddObligation { obligation } => {
                    obligations.insert(
                        obligation.code.clone(),
                        (obligation.clone(), bundle.bundle_id.clone()),
                    );
                }
                OverlayOp::RemoveObligation { obligation_code } => {
                    obligations.remove(obligation_code);
                }
                OverlayOp::ModifyApplicability {
                    obligation_code,
                    applicability,
                } => {
                    if let Some((ob, _)) = obligations.get_mut(obligation_code) {
                        ob.applicability = applicability.clone();
                    }
                }
            }
        }
    }

    bundle_refs.sort();

    let mut compiled: Vec<CompiledObligation> = Vec::new();
    let mut excluded_obligations: Vec<ExcludedObligation> = Vec::new();
    let mut excluded_datapoints: Vec<ExcludedDatapoint> = Vec::new();
    for (code, (ob, source_bundle_id)) in obligations {
        if !applicability::parse_and_evaluate(&ob.applicability, profile)? {
            excluded_obligations.push(ExcludedObligation {
                code,
                source_bundle_id,
                reason_code: "NOT_APPLICABLE".to_string(),
            });
            continue;
        }
        let phased_in = ob
            .phase_in
            .map(|p| profile.reporting_year >= p.applies_from_year)
            .unwrap_or(true);

        let mut keys = ob.datapoint_keys.clone();
        keys.sort();

        if !phased_in {
            for key in &keys {
                excluded_datapoints.push(ExcludedDatapoint {
                    obligation_code: code.clone(),
                    datapoint_key: key.clone(),
                    reason_code: "PHASE_IN".to_string(),
                });
            }
        }

        compiled.push(CompiledObligation {
            code,
            section: ob.section.clone(),
            datapoint_keys: keys,
            mandatory: ob.mandatory && phased_in,
            source_bundle_id,
        });
    }
    compiled.sort_by(|a, b| a.code.cmp(&b.code));
    excluded_obligations.sort_by(|a, b| a.code.cmp(&b.code));
    excluded_datapoints.sort_by(|a, b| {
        a.obligation_code
            .cmp(&b.obligation_code)
            .then(a.datapoint_key.cmp(&b.datapoint_key))
    });

    if compiled.is_empty() {
        return Err(ComplianceError::new(
            ErrorKind::EmptyPlan,
            "compiled plan has zero applicable obligations",
        ));
    }

    let plan_hash = compliance_canon::fingerprint(&PlanFingerprintInput {
        bundle_refs: &bundle_refs,
        obligations: &compiled,
        excluded_obligations: &excluded_obligations,
        excluded_datapoints: &excluded_datapoints,
    })
    .map_err(|e| ComplianceError::new(ErrorKind::Integrity, "failed to fingerprint plan").with_source(e))?;

    Ok(CompiledPlan {
        bundle_refs,
        obligations: compiled,
        excluded_obligations,
        excluded_datapoints,
        plan_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use compliance_bundle::{Datapoint, DatapointType, Overlay, PhaseIn, Regime};
    use uuid::Uuid;

    fn profile(jurisdictions: Vec<&str>, year: u16) -> CompanyProfile {
        CompanyProfile {
            tenant_id: Uuid::nil(),
            company_id: Uuid::nil(),
            name: "Acme".to_string(),
            employees: 500,
            turnover: 60_000_000.0,
            listed_status: compliance_core::ListedStatus::Listed,
            reporting_year: year,
            reporting_year_start: NaiveDate::from_ymd_opt(year as i32, 1, 1).unwrap(),
            reporting_year_end: NaiveDate::from_ymd_opt(year as i32, 12, 31).unwrap(),
            jurisdictions: jurisdictions.into_iter().map(String::from).collect(),
            regimes: vec!["ESRS".to_string()],
        }
    }

    fn base_bundle() -> Bundle {
        Bundle {
            bundle_id: "esrs_mini".to_string(),
            version: "2026.01".to_string(),
            regime: Regime {
                code: "ESRS".to_string(),
                name: "ESRS".to_string(),
            },
            jurisdiction: "EU".to_string(),
            obligations: vec![Obligation {
                code: "E1-6".to_string(),
                section: "Climate".to_string(),
                datapoint_keys: vec!["scope1".to_string()],
                mandatory: true,
                applicability: "employees >= 250".to_string(),
                phase_in: None,
            }],
            datapoints: vec![Datapoint {
                key: "scope1".to_string(),
                label: "Scope 1".to_string(),
                datapoint_type: DatapointType::Numeric,
                requires_baseline: true,
                unit_vocabulary: vec!["tCO2e".to_string()],
            }],
            overlays: vec![],
            source_record_ids: vec![],
        }
    }

    #[test]
    fn compiles_a_single_applicable_obligation() {
        let plan = compile(&[base_bundle()], &profile(vec!["DE"], 2026)).unwrap();
        assert_eq!(plan.obligations.len(), 1);
        assert_eq!(plan.obligations[0].code, "E1-6");
        assert!(!plan.plan_hash.is_empty());
    }

    #[test]
    fn non_applicable_company_yields_empty_plan_error() {
        let mut profile = profile(vec!["DE"], 2026);
        profile.employees = 10;
        let err = compile(&[base_bundle()], &profile).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyPlan);
    }

    #[test]
    fn non_applicable_obligation_is_recorded_with_reason() {
        let mut bundle = base_bundle();
        bundle.obligations.push(Obligation {
            code: "E1-9".to_string(),
            section: "Climate".to_string(),
            datapoint_keys: vec!["scope1".to_string()],
            mandatory: true,
            applicability: "employees >= 999999".to_string(),
            phase_in: None,
        });
        let plan = compile(&[bundle], &profile(vec!["DE"], 2026)).unwrap();
        assert_eq!(plan.obligations.len(), 1);
        assert_eq!(plan.excluded_obligations.len(), 1);
        assert_eq!(plan.excluded_obligations[0].code, "E1-9");
        assert_eq!(plan.excluded_obligations[0].reason_code, "NOT_APPLICABLE");
    }

    #[test]
    fn phase_in_excludes_datapoints_with_reason() {
        let mut bundle = base_bundle();
        bundle.obligations[0].phase_in = Some(PhaseIn {
            applies_from_year: 2028,
        });
        let plan = compile(&[bundle], &profile(vec!["DE"], 2026)).unwrap();
        assert_eq!(plan.excluded_datapoints.len(), 1);
        assert_eq!(plan.excluded_datapoints[0].obligation_code, "E1-6");
        assert_eq!(plan.excluded_datapoints[0].datapoint_key, "scope1");
        assert_eq!(plan.excluded_datapoints[0].reason_code, "PHASE_IN");
    }

    #[test]
    fn overlay_add_is_applied_in_matching_jurisdiction() {
        let mut bundle = base_bundle();
        bundle.overlays.push(Overlay {
            jurisdiction: "DE".to_string(),
            op_index: 0,
            op: OverlayOp::AddObligation {
                obligation: Obligation {
                    code: "DE-X1".to_string(),
                    section: "Climate".to_string(),
                    datapoint_keys: vec!["scope1".to_string()],
                    mandatory: true,
                    applicability: "true".to_string(),
                    phase_in: None,
                },
            },
        });
        let plan = compile(&[bundle], &profile(vec!["DE"], 2026)).unwrap();
        let codes: Vec<&str> = plan.obligations.iter().map(|o| o.code.as_str()).collect();
        assert!(codes.contains(&"DE-X1"));
    }

    #[test]
    fn overlay_outside_jurisdiction_is_not_applied() {
        let mut bundle = base_bundle();
        bundle.overlays.push(Overlay {
            jurisdiction: "FR".to_string(),
            op_index: 0,
            op: OverlayOp::RemoveObligation {
                obligation_code: "E1-6".to_string(),
            },
        });
        let plan = compile(&[bundle], &profile(vec!["DE"], 2026)).unwrap();
        assert_eq!(plan.obligations.len(), 1);
    }

    #[test]
    fn phase_in_suppresses_mandatory_before_effective_year() {
        let mut bundle = base_bundle();
        bundle.obligations[0].phase_in = Some(PhaseIn {
            applies_from_year: 2028,
        });
        let plan = compile(&[bundle], &profile(vec!["DE"], 2026)).unwrap();
        assert!(!plan.obligations[0].mandatory);
    }

    #[test]
    fn plan_hash_is_deterministic() {
        let bundle = base_bundle();
        let profile = profile(vec!["DE"], 2026);
        let a = compile(&[bundle.clone()], &profile).unwrap();
        let b = compile(&[bundle], &profile).unwrap();
        assert_eq!(a.plan_hash, b.plan_hash);
    }

    #[test]
    fn overlays_applied_in_jurisdiction_then_op_index_order() {
        let mut bundle = base_bundle();
        bundle.overlays.push(Overlay {
            jurisdiction: "DE".to_string(),
            op_index: 1,
            op: OverlayOp::ModifyApplicability {
                obligation_code: "E1-6".to_string(),
                applicability: "employees >= 1".to_string(),
            },
        });
        bundle.overlays.push(Overlay {
            jurisdiction: "DE".to_string(),
            op_index: 0,
            op: OverlayOp::ModifyApplicability {
                obligation_code: "E1-6".to_string(),
                applicability: "employees >= 999999".to_string(),
            },
        });
        let mut profile = profile(vec!["DE"], 2026);
        profile.employees = 500;
        let plan = compile(&[bundle], &profile).unwrap();
        assert_eq!(plan.obligations.len(), 1);
    }
}
