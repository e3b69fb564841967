// SPDX-License-Identifier: MIT OR Apache-2.0
//! Company profile context and run lifecycle records (data model §3: Run).

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a company's securities are publicly listed. Drives several
/// applicability rules (e.g. CSRD listed-SME phase-in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListedStatus {
    /// Securities are admitted to trading on a regulated market.
    Listed,
    /// Not publicly listed.
    Unlisted,
}

/// The whitelisted company-profile context consumed by the applicability
/// evaluator (§4.7). Every field here is a legal attribute-access target
/// for an applicability-rule expression; nothing else is.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompanyProfile {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Company identifier.
    pub company_id: Uuid,
    /// Display name.
    pub name: String,
    /// Headcount at period end.
    pub employees: u64,
    /// Net turnover, in the company's reporting currency.
    pub turnover: f64,
    /// Listed/unlisted status.
    pub listed_status: ListedStatus,
    /// Reporting year under assessment.
    pub reporting_year: u16,
    /// First day of the reporting period.
    pub reporting_year_start: NaiveDate,
    /// Last day of the reporting period.
    pub reporting_year_end: NaiveDate,
    /// Jurisdiction codes (ISO 3166-1 alpha-2) the company operates in.
    pub jurisdictions: Vec<String>,
    /// Regimes the company has explicitly declared itself in scope for
    /// (e.g. `"CSRD"`, `"SFDR"`). The compiler never infers regime
    /// applicability from free text — only from this explicit list.
    pub regimes: Vec<String>,
}

/// Lifecycle status of a [`Run`]. `Completed`, `Failed`, and
/// `IntegrityWarning` are terminal: once reached, outputs are never
/// rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to start.
    Queued,
    /// Actively iterating the compiled plan.
    Running,
    /// Finished; all datapoints persisted, coverage and manifest written.
    Completed,
    /// Terminated before completion (preflight failure, integrity error,
    /// cancellation, or per-datapoint failure threshold exceeded).
    Failed,
    /// Completed, but the diagnostic failure rate crossed the configured
    /// threshold; outputs are still persisted and final.
    IntegrityWarning,
}

impl RunStatus {
    /// `true` for any of the three terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::IntegrityWarning)
    }
}

/// A single compliance assessment run against one company and reporting
/// period.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Run {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Company under assessment.
    pub company_id: Uuid,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// How the regulatory compiler was invoked (e.g. `"standard"`,
    /// `"preview"`); part of the run-hash input.
    pub compiler_mode: String,
    /// Extraction provider identity used for this run.
    pub provider_id: String,
    /// Canonical run fingerprint (§4.11). Present once the preflight
    /// inputs are fully known, even before the run completes.
    pub run_hash: String,
    /// Single reason code from the error taxonomy, set only on `Failed`.
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::IntegrityWarning.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
