//! Output table rows.
//!
//! Each struct is one flat row of a published table; field order is column
//! order. Rates are percentages with one decimal, indices have two.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{GapSeverity, PeerTier, PellTier, SizeTier, UnitId, Urbanicity, Year};

/// The published tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    DimTexasInstitutions,
    FctStudentOutcomes,
    IntPeerGroups,
    RptPeerComparison,
    RptEquityDashboard,
}

impl TableName {
    pub const ALL: [TableName; 5] = [
        Self::DimTexasInstitutions,
        Self::FctStudentOutcomes,
        Self::IntPeerGroups,
        Self::RptPeerComparison,
        Self::RptEquityDashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DimTexasInstitutions => "dim_texas_institutions",
            Self::FctStudentOutcomes => "fct_student_outcomes",
            Self::IntPeerGroups => "int_peer_groups",
            Self::RptPeerComparison => "rpt_peer_comparison",
            Self::RptEquityDashboard => "rpt_equity_dashboard",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `dim_texas_institutions`: one row per selected institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstitutionDimension {
    pub unitid: UnitId,
    /// Survey year of the institution attributes.
    pub year: Year,
    pub institution_name: String,
    pub city: Option<String>,
    pub state: String,
    pub sector: Option<i32>,
    pub control: Option<i32>,
    pub iclevel: Option<i32>,
    pub carnegie_basic: Option<i32>,
    pub highest_degree: Option<i32>,
    pub locale: Option<i32>,
    pub locale_type: Option<String>,
    pub size_category: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub website: Option<String>,

    pub peer_group_key: Option<String>,
    pub size_tier: Option<SizeTier>,
    pub is_hsi: Option<bool>,
    pub pell_tier: Option<PellTier>,
    pub urbanicity: Option<Urbanicity>,

    pub enrollment_year: Option<Year>,
    pub total_enrollment: Option<u32>,
    pub pct_hispanic: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_asian: Option<f64>,
    pub pell_year: Option<Year>,
    pub pell_pct: Option<f64>,

    pub retention_year: Option<Year>,
    pub full_time_retention_rate: Option<f64>,
    pub part_time_retention_rate: Option<f64>,
    pub blended_retention_rate: Option<f64>,
    pub student_faculty_ratio: Option<f64>,
}

/// `fct_student_outcomes`: one row per (unitid, year) with any outcome data.
///
/// A domain with no source row for the key leaves all its columns null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeFact {
    pub unitid: UnitId,
    pub year: Year,
    pub institution_name: Option<String>,

    // Completions
    pub total_completions: Option<u32>,
    pub certificates_under_1yr: Option<u32>,
    pub certificates_1_2yr: Option<u32>,
    pub associate_degrees: Option<u32>,
    pub total_certificates: Option<u32>,
    pub associate_men: Option<u32>,
    pub associate_women: Option<u32>,
    pub associate_aian: Option<u32>,
    pub associate_asian: Option<u32>,
    pub associate_black: Option<u32>,
    pub associate_hispanic: Option<u32>,
    pub associate_nhpi: Option<u32>,
    pub associate_white: Option<u32>,
    pub associate_two_or_more: Option<u32>,
    pub associate_unknown: Option<u32>,
    pub associate_nonresident: Option<u32>,
    pub pct_associate_hispanic: Option<f64>,
    pub pct_associate_black: Option<f64>,
    pub pct_associate_white: Option<f64>,
    pub pct_associate_asian: Option<f64>,

    // Graduation
    pub adjusted_cohort: Option<u32>,
    pub completers_150: Option<u32>,
    pub transfer_out: Option<u32>,
    pub graduation_rate_150: Option<f64>,
    pub transfer_out_rate: Option<f64>,
    pub success_rate: Option<f64>,
    pub grad_rate_men: Option<f64>,
    pub grad_rate_women: Option<f64>,
    pub grad_rate_hispanic: Option<f64>,
    pub grad_rate_black: Option<f64>,
    pub grad_rate_white: Option<f64>,
    pub grad_rate_asian: Option<f64>,
    pub grad_rate_two_or_more: Option<f64>,
    pub equity_gap_hispanic: Option<f64>,
    pub equity_gap_black: Option<f64>,
    pub equity_gap_asian: Option<f64>,
    pub equity_gap_two_or_more: Option<f64>,

    // Retention
    pub full_time_retention_rate: Option<f64>,
    pub part_time_retention_rate: Option<f64>,
    pub full_time_cohort: Option<u32>,
    pub full_time_retained: Option<u32>,
    pub part_time_cohort: Option<u32>,
    pub part_time_retained: Option<u32>,
    pub blended_retention_rate: Option<f64>,
    pub student_faculty_ratio: Option<f64>,
}

/// `int_peer_groups`: peer classification per institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerGroupRow {
    pub unitid: UnitId,
    pub institution_name: Option<String>,
    pub enrollment_year: Year,
    pub total_enrollment: u32,
    pub pct_hispanic: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_asian: Option<f64>,
    pub pell_year: Option<Year>,
    pub pell_pct: Option<f64>,
    pub locale_type: Option<String>,
    pub size_tier: SizeTier,
    pub is_hsi: bool,
    pub pell_tier: PellTier,
    pub urbanicity: Urbanicity,
    pub peer_group_key: String,
}

/// `rpt_peer_comparison`: outcome metrics against the peer-group mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerComparisonRow {
    pub unitid: UnitId,
    pub year: Year,
    pub institution_name: Option<String>,
    pub peer_group_key: String,
    pub size_tier: SizeTier,
    pub is_hsi: bool,
    pub pell_tier: PellTier,
    pub urbanicity: Urbanicity,
    /// Institutions sharing the peer key.
    pub peer_group_size: u32,

    pub graduation_rate_150: Option<f64>,
    pub peer_avg_grad_rate: Option<f64>,
    pub grad_rate_vs_peers: Option<f64>,
    pub grad_rate_tier: Option<PeerTier>,

    pub success_rate: Option<f64>,
    pub peer_avg_success_rate: Option<f64>,
    pub success_rate_vs_peers: Option<f64>,
    pub success_rate_tier: Option<PeerTier>,

    pub full_time_retention_rate: Option<f64>,
    pub peer_avg_retention_rate: Option<f64>,
    pub retention_rate_vs_peers: Option<f64>,
    pub retention_rate_tier: Option<PeerTier>,
}

/// `rpt_equity_dashboard`: demographic outcomes and gaps per institution-year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityDashboardRow {
    pub unitid: UnitId,
    pub year: Year,
    pub institution_name: Option<String>,
    pub city: Option<String>,
    pub peer_group_key: Option<String>,
    pub size_tier: Option<SizeTier>,
    pub is_hsi: Option<bool>,
    pub pell_tier: Option<PellTier>,
    pub urbanicity: Option<Urbanicity>,
    pub total_enrollment: Option<u32>,
    pub pct_hispanic: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_asian: Option<f64>,

    pub graduation_rate_150: Option<f64>,
    pub grad_rate_hispanic: Option<f64>,
    pub grad_rate_black: Option<f64>,
    pub grad_rate_white: Option<f64>,
    pub grad_rate_asian: Option<f64>,
    pub grad_rate_two_or_more: Option<f64>,
    pub full_time_retention_rate: Option<f64>,
    pub part_time_retention_rate: Option<f64>,

    pub equity_gap_hispanic: Option<f64>,
    pub hispanic_gap_severity: GapSeverity,
    pub equity_gap_black: Option<f64>,
    pub black_gap_severity: GapSeverity,
    pub equity_gap_asian: Option<f64>,
    pub asian_gap_severity: GapSeverity,
    pub equity_gap_two_or_more: Option<f64>,
    pub two_or_more_gap_severity: GapSeverity,

    pub pct_associate_hispanic: Option<f64>,
    pub pct_associate_black: Option<f64>,
    pub pct_associate_white: Option<f64>,
    pub pct_associate_asian: Option<f64>,
    pub hispanic_completion_equity_index: Option<f64>,
    pub black_completion_equity_index: Option<f64>,
    pub white_completion_equity_index: Option<f64>,
    pub asian_completion_equity_index: Option<f64>,
}

/// Every output table of one run, rows ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tables {
    pub institutions: Vec<InstitutionDimension>,
    pub outcomes: Vec<OutcomeFact>,
    pub peer_groups: Vec<PeerGroupRow>,
    pub peer_comparison: Vec<PeerComparisonRow>,
    pub equity_dashboard: Vec<EquityDashboardRow>,
}

impl Tables {
    pub fn row_count(&self, table: TableName) -> usize {
        match table {
            TableName::DimTexasInstitutions => self.institutions.len(),
            TableName::FctStudentOutcomes => self.outcomes.len(),
            TableName::IntPeerGroups => self.peer_groups.len(),
            TableName::RptPeerComparison => self.peer_comparison.len(),
            TableName::RptEquityDashboard => self.equity_dashboard.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(TableName::parse("FCT_STUDENT_OUTCOMES"), Some(TableName::FctStudentOutcomes));
        assert_eq!(TableName::parse("stg_hd"), None);
        assert_eq!(TableName::IntPeerGroups.to_string(), "int_peer_groups");
    }

    #[test]
    fn test_empty_fact_is_all_null() {
        let fact = OutcomeFact { unitid: 1, year: 2024, ..Default::default() };
        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["unitid"], 1);
        assert!(value["graduation_rate_150"].is_null());
        assert!(value["total_completions"].is_null());
    }
}
