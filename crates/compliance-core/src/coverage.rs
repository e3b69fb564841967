// SPDX-License-Identifier: MIT OR Apache-2.0
//! Obligation coverage roll-up records (data model §3: ObligationCoverage).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::AssessmentStatus;

/// Roll-up level for one obligation's mandatory datapoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLevel {
    /// Every mandatory datapoint is `Present`.
    Full,
    /// At least one mandatory datapoint is `Present`, but not all.
    Partial,
    /// No mandatory datapoint is `Present`.
    Absent,
    /// No mandatory datapoints are applicable.
    NotApplicable,
}

impl CoverageLevel {
    /// Compute the roll-up level from the statuses of an obligation's
    /// mandatory datapoints (testable property 6).
    ///
    /// # Examples
    ///
    /// ```
    /// use compliance_core::{AssessmentStatus, CoverageLevel};
    /// let statuses = [AssessmentStatus::Present, AssessmentStatus::Absent];
    /// assert_eq!(CoverageLevel::from_mandatory_statuses(&statuses), CoverageLevel::Partial);
    /// assert_eq!(CoverageLevel::from_mandatory_statuses(&[]), CoverageLevel::NotApplicable);
    /// ```
    pub fn from_mandatory_statuses(statuses: &[AssessmentStatus]) -> Self {
        if statuses.is_empty() {
            return Self::NotApplicable;
        }
        let present = statuses
            .iter()
            .filter(|s| matches!(s, AssessmentStatus::Present))
            .count();
        if present == statuses.len() {
            Self::Full
        } else if present == 0 {
            Self::Absent
        } else {
            Self::Partial
        }
    }
}

/// Coverage roll-up for a single obligation within one compiled plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObligationCoverage {
    /// Compiled plan this roll-up belongs to.
    pub plan_hash: String,
    /// Obligation code, e.g. `"ESRS-E1"`.
    pub obligation_code: String,
    /// Standard/topic grouping, e.g. `"E1"`, `"Cross-cutting"`.
    pub section: String,
    /// Roll-up level.
    pub level: CoverageLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_requires_all_present() {
        let statuses = [AssessmentStatus::Present, AssessmentStatus::Present];
        assert_eq!(CoverageLevel::from_mandatory_statuses(&statuses), CoverageLevel::Full);
    }

    #[test]
    fn absent_requires_none_present() {
        let statuses = [AssessmentStatus::Absent, AssessmentStatus::NeedsReview];
        assert_eq!(CoverageLevel::from_mandatory_statuses(&statuses), CoverageLevel::Absent);
    }

    #[test]
    fn partial_is_the_remaining_case() {
        let statuses = [AssessmentStatus::Present, AssessmentStatus::Partial];
        assert_eq!(CoverageLevel::from_mandatory_statuses(&statuses), CoverageLevel::Partial);
    }

    #[test]
    fn no_mandatory_datapoints_is_not_applicable() {
        assert_eq!(CoverageLevel::from_mandatory_statuses(&[]), CoverageLevel::NotApplicable);
    }
}
