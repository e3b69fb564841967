// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic fixtures and `proptest` strategies shared across the
//! compliance pipeline's test suites.
//!
//! Nothing here is wired into the pipeline at runtime — every other crate
//! that wants a `CompanyProfile` or bundle fixture for its own tests takes
//! this as a dev-dependency instead of hand-rolling one, so the literal-seed
//! scenarios (§8 S1-S6 style) stay consistent across crates.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::NaiveDate;
use compliance_bundle::{Bundle, Datapoint, DatapointType, Obligation, Regime};
use compliance_core::{CompanyProfile, ListedStatus};
use uuid::Uuid;

/// Fixed byte corpus standing in for a 3-page PDF. Never changes across
/// releases — tests pinning a literal `doc_hash` depend on that.
pub const SAMPLE_DOCUMENT_BYTES: &[u8] =
    b"Page 1: Scope 1 emissions were not disclosed this period.\n\
      Page 2: The company has not published a transition plan.\n\
      Page 3: No comparative baseline figures are available.\n";

/// A minimal `esrs_mini@2026.01` bundle with the two datapoints used by
/// the canonical deterministic-fallback scenario: `ESRS-E1-1` (a text
/// disclosure) and `ESRS-E1-6` (a metric requiring a comparative baseline).
pub fn minimal_bundle() -> Bundle {
    Bundle {
        bundle_id: "esrs_mini".to_string(),
        version: "2026.01".to_string(),
        regime: Regime {
            code: "ESRS".to_string(),
            name: "European Sustainability Reporting Standards".to_string(),
        },
        jurisdiction: "DE".to_string(),
        obligations: vec![Obligation {
            code: "E1".to_string(),
            section: "Climate".to_string(),
            datapoint_keys: vec!["ESRS-E1-1".to_string(), "ESRS-E1-6".to_string()],
            mandatory: true,
            applicability: "true".to_string(),
            phase_in: None,
        }],
        datapoints: vec![
            Datapoint {
                key: "ESRS-E1-1".to_string(),
                label: "Transition plan for climate change mitigation".to_string(),
                datapoint_type: DatapointType::Text,
                requires_baseline: false,
                unit_vocabulary: vec![],
            },
            Datapoint {
                key: "ESRS-E1-6".to_string(),
                label: "Gross Scope 1 GHG emissions".to_string(),
                datapoint_type: DatapointType::Numeric,
                requires_baseline: true,
                unit_vocabulary: vec!["tCO2e".to_string()],
            },
        ],
        overlays: vec![],
        source_record_ids: vec![],
    }
}

/// A deterministic, listed company in scope for ESRS with `reporting_year
/// 2026` — the company half of the canonical deterministic-fallback
/// scenario.
pub fn sample_company_profile() -> CompanyProfile {
    CompanyProfile {
        tenant_id: Uuid::nil(),
        company_id: Uuid::nil(),
        name: "Acme Industrial GmbH".to_string(),
        employees: 500,
        turnover: 60_000_000.0,
        listed_status: ListedStatus::Listed,
        reporting_year: 2026,
        reporting_year_start: NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"),
        reporting_year_end: NaiveDate::from_ymd_opt(2026, 12, 31).expect("valid date"),
        jurisdictions: vec!["DE".to_string()],
        regimes: vec!["ESRS".to_string()],
    }
}

/// `proptest` strategies for fuzzing pipeline inputs with structurally
/// valid, arbitrary data.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// Arbitrary document bytes: short, printable-ASCII text, representative
    /// of what the deterministic extractor sees (never truly binary, since
    /// the extractor treats unparseable bytes as zero pages rather than
    /// erroring).
    pub fn arb_document_bytes() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(0x20u8..0x7e, 0..2048)
    }

    /// Arbitrary chunker target length and overlap, `overlap < target_len`
    /// so the pair is always structurally valid.
    pub fn arb_chunk_dimensions() -> impl Strategy<Value = (usize, usize)> {
        (50usize..2000).prop_flat_map(|target_len| (Just(target_len), 0usize..target_len))
    }

    /// Arbitrary employee count and turnover, spanning the CSRD/SME
    /// thresholds so applicability tests see both sides of the boundary.
    pub fn arb_company_size() -> impl Strategy<Value = (u64, f64)> {
        (0u64..100_000, 0f64..500_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_bundle_is_structurally_valid() {
        minimal_bundle().validate().expect("fixture bundle must validate");
    }

    #[test]
    fn sample_company_profile_is_in_scope_for_its_own_bundle() {
        let profile = sample_company_profile();
        assert!(profile.jurisdictions.contains(&"DE".to_string()));
        assert!(profile.regimes.contains(&"ESRS".to_string()));
    }

    proptest::proptest! {
        #[test]
        fn arb_chunk_dimensions_never_yield_overlap_ge_target(
            (target_len, overlap) in strategies::arb_chunk_dimensions()
        ) {
            proptest::prop_assert!(overlap < target_len);
        }
    }
}
