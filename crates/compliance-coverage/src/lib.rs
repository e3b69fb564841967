// SPDX-License-Identifier: MIT OR Apache-2.0
//! Coverage matrix aggregation (C13): per-obligation roll-up grouped by
//! report section. Every declared section is always present in the
//! output, even when it has zero obligations for this run — it is marked
//! explicitly with an empty obligation list rather than omitted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use compliance_compiler::CompiledPlan;
use compliance_core::{Assessment, AssessmentStatus, CoverageLevel, ObligationCoverage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// All obligation roll-ups for one report section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionCoverage {
    /// Section name, e.g. `"Climate"`.
    pub section: String,
    /// Roll-ups for every obligation in this section, ordered by
    /// `obligation_code` ascending. Empty when no compiled obligation
    /// belongs to this section for the run.
    pub obligations: Vec<ObligationCoverage>,
}

/// The full per-run coverage matrix.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverageMatrix {
    /// Plan this matrix was computed from.
    pub plan_hash: String,
    /// Sections, ordered alphabetically by `section`.
    pub sections: Vec<SectionCoverage>,
}

/// Build the coverage matrix for `plan` given this run's `assessments`.
///
/// `known_sections` is the full section catalog a bundle declares — pass
/// the bundle's complete section list so sections with zero applicable
/// obligations still appear, explicitly empty, rather than being silently
/// dropped from the report.
pub fn build_coverage_matrix(
    plan: &CompiledPlan,
    assessments: &[Assessment],
    known_sections: &[String],
) -> CoverageMatrix {
    let by_key: HashMap<&str, &Assessment> = assessments
        .iter()
        .map(|a| (a.datapoint_key.as_str(), a))
        .collect();

    let mut by_section: BTreeMap<String, Vec<ObligationCoverage>> = BTreeMap::new();
    for section in known_sections {
        by_section.entry(section.clone()).or_default();
    }

    for obligation in &plan.obligations {
        let level = if !obligation.mandatory {
            CoverageLevel::NotApplicable
        } else {
            let statuses: Vec<AssessmentStatus> = obligation
                .datapoint_keys
                .iter()
                .map(|key| {
                    by_key
                        .get(key.as_str())
                        .map(|a| a.status)
                        .unwrap_or(AssessmentStatus::Absent)
                })
                .collect();
            CoverageLevel::from_mandatory_statuses(&statuses)
        };

        by_section
            .entry(obligation.section.clone())
            .or_default()
            .push(ObligationCoverage {
                plan_hash: plan.plan_hash.clone(),
                obligation_code: obligation.code.clone(),
                section: obligation.section.clone(),
                level,
            });
    }

    let sections = by_section
        .into_iter()
        .map(|(section, mut obligations)| {
            obligations.sort_by(|a, b| a.obligation_code.cmp(&b.obligation_code));
            SectionCoverage {
                section,
                obligations,
            }
        })
        .collect();

    CoverageMatrix {
        plan_hash: plan.plan_hash.clone(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_compiler::CompiledObligation;
    use compliance_core::RetrievalParams;

    fn plan() -> CompiledPlan {
        CompiledPlan {
            bundle_refs: vec![("esrs_mini".to_string(), "2026.01".to_string(), "checksum".to_string())],
            obligations: vec![
                CompiledObligation {
                    code: "E1-6".to_string(),
                    section: "Climate".to_string(),
                    datapoint_keys: vec!["scope1".to_string()],
                    mandatory: true,
                    source_bundle_id: "esrs_mini".to_string(),
                },
                CompiledObligation {
                    code: "E1-7".to_string(),
                    section: "Climate".to_string(),
                    datapoint_keys: vec!["scope2".to_string()],
                    mandatory: false,
                    source_bundle_id: "esrs_mini".to_string(),
                },
            ],
            excluded_obligations: vec![],
            excluded_datapoints: vec![],
            plan_hash: "planhash".to_string(),
        }
    }

    fn assessment(key: &str, status: AssessmentStatus) -> Assessment {
        Assessment {
            run_id: uuid::Uuid::nil(),
            datapoint_key: key.to_string(),
            status,
            value: None,
            unit: None,
            year: None,
            baseline_year: None,
            baseline_value: None,
            rationale: String::new(),
            evidence_chunk_ids: vec![],
            prompt_hash: "hash".to_string(),
            retrieval_params: RetrievalParams::default(),
        }
    }

    #[test]
    fn full_coverage_when_mandatory_datapoint_present() {
        let assessments = vec![assessment("scope1", AssessmentStatus::Present)];
        let matrix = build_coverage_matrix(&plan(), &assessments, &[]);
        let climate = matrix.sections.iter().find(|s| s.section == "Climate").unwrap();
        let e1_6 = climate.obligations.iter().find(|o| o.obligation_code == "E1-6").unwrap();
        assert_eq!(e1_6.level, CoverageLevel::Full);
    }

    #[test]
    fn voluntary_obligation_is_not_applicable() {
        let matrix = build_coverage_matrix(&plan(), &[], &[]);
        let climate = matrix.sections.iter().find(|s| s.section == "Climate").unwrap();
        let e1_7 = climate.obligations.iter().find(|o| o.obligation_code == "E1-7").unwrap();
        assert_eq!(e1_7.level, CoverageLevel::NotApplicable);
    }

    #[test]
    fn missing_assessment_counts_as_absent() {
        let matrix = build_coverage_matrix(&plan(), &[], &[]);
        let climate = matrix.sections.iter().find(|s| s.section == "Climate").unwrap();
        let e1_6 = climate.obligations.iter().find(|o| o.obligation_code == "E1-6").unwrap();
        assert_eq!(e1_6.level, CoverageLevel::Absent);
    }

    #[test]
    fn known_sections_with_no_obligations_still_appear() {
        let known = vec!["Climate".to_string(), "Social".to_string()];
        let matrix = build_coverage_matrix(&plan(), &[], &known);
        let social = matrix.sections.iter().find(|s| s.section == "Social").unwrap();
        assert!(social.obligations.is_empty());
    }

    #[test]
    fn sections_are_alphabetically_sorted() {
        let known = vec!["Zeta".to_string(), "Alpha".to_string()];
        let matrix = build_coverage_matrix(&plan(), &[], &known);
        let names: Vec<&str> = matrix.sections.iter().map(|s| s.section.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
