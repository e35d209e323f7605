//! Graduation-cohort reconciliation.
//!
//! IPEDS reports graduation cohorts under two coding schemes:
//!
//! ```text
//!  role                     two-year scheme   four-year scheme
//!  adjusted cohort          GRTYPE 29         GRTYPE 2
//!  completers within 150%   GRTYPE 30         GRTYPE 3
//!  transfer-outs            GRTYPE 33         GRTYPE 4
//! ```
//!
//! The schemes are not additive. For each (unitid, year) and role, every field
//! (total and each demographic) is the first non-null candidate in scheme
//! priority order: two-year first, four-year as fallback. An institution may
//! switch schemes between years, so the choice is made per year.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::logs::{log_warning, log_warning_indent};
use crate::models::{CohortRow, DemographicGroup, Demographics, FactKey, UnitId, Year};

/// Cohort coding scheme, in priority order (earlier wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortScheme {
    TwoYear,
    FourYear,
}

/// Semantic role of a cohort line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortRole {
    AdjustedCohort,
    Completers150,
    TransferOut,
}

impl CohortRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdjustedCohort => "adjusted cohort",
            Self::Completers150 => "completers within 150%",
            Self::TransferOut => "transfer-out",
        }
    }
}

/// Map a `GRTYPE` code to its scheme and role; other codes are not used.
pub fn classify_cohort_type(code: i32) -> Option<(CohortScheme, CohortRole)> {
    match code {
        29 => Some((CohortScheme::TwoYear, CohortRole::AdjustedCohort)),
        30 => Some((CohortScheme::TwoYear, CohortRole::Completers150)),
        33 => Some((CohortScheme::TwoYear, CohortRole::TransferOut)),
        2 => Some((CohortScheme::FourYear, CohortRole::AdjustedCohort)),
        3 => Some((CohortScheme::FourYear, CohortRole::Completers150)),
        4 => Some((CohortScheme::FourYear, CohortRole::TransferOut)),
        _ => None,
    }
}

/// Total and demographic counts for one role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CohortCounts {
    pub total: Option<u32>,
    pub demographics: Demographics,
}

impl CohortCounts {
    /// Count for one group, or the total when `group` is `None`.
    pub fn count(&self, group: Option<DemographicGroup>) -> Option<u32> {
        match group {
            None => self.total,
            Some(g) => self.demographics.get(g),
        }
    }
}

/// Candidate values for one role, tagged by scheme.
#[derive(Debug, Clone, Default)]
struct RoleCandidates {
    candidates: Vec<(CohortScheme, CohortCounts)>,
}

impl RoleCandidates {
    /// Returns false when the scheme already had a row (the first one is kept).
    fn offer(&mut self, scheme: CohortScheme, counts: CohortCounts) -> bool {
        if self.candidates.iter().any(|(s, _)| *s == scheme) {
            return false;
        }
        self.candidates.push((scheme, counts));
        self.candidates.sort_by_key(|(s, _)| *s);
        true
    }

    fn has_both_schemes(&self) -> bool {
        self.candidates.len() > 1
    }

    fn first_non_null(&self, group: Option<DemographicGroup>) -> Option<u32> {
        self.candidates.iter().find_map(|(_, c)| c.count(group))
    }

    fn resolve(&self) -> CohortCounts {
        let mut demographics = Demographics::default();
        for group in DemographicGroup::ALL {
            demographics.set(group, self.first_non_null(Some(group)));
        }
        CohortCounts {
            total: self.first_non_null(None),
            demographics,
        }
    }

    fn totals(&self) -> Vec<Option<u32>> {
        self.candidates.iter().map(|(_, c)| c.total).collect()
    }
}

/// One reconciled cohort per (unitid, year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciledCohort {
    pub unitid: UnitId,
    pub year: Year,
    pub adjusted_cohort: CohortCounts,
    pub completers_150: CohortCounts,
    pub transfer_out: CohortCounts,
}

impl ReconciledCohort {
    pub fn adjusted_cohort_total(&self) -> Option<u32> {
        self.adjusted_cohort.total
    }

    pub fn completers_150_total(&self) -> Option<u32> {
        self.completers_150.total
    }

    pub fn transfer_out_total(&self) -> Option<u32> {
        self.transfer_out.total
    }
}

/// Both schemes reported the same role for one institution-year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeOverlap {
    pub unitid: UnitId,
    pub year: Year,
    pub role: CohortRole,
    pub two_year_total: Option<u32>,
    pub four_year_total: Option<u32>,
}

impl SchemeOverlap {
    pub fn totals_conflict(&self) -> bool {
        self.two_year_total != self.four_year_total
    }
}

/// Output of [`reconcile_cohorts`].
#[derive(Debug, Clone, Default)]
pub struct CohortReconciliation {
    pub cohorts: BTreeMap<FactKey, ReconciledCohort>,
    /// Audit trail of institution-years resolved by scheme priority.
    pub overlaps: Vec<SchemeOverlap>,
    /// Rows dropped because their scheme already had a row for that role.
    pub duplicates: usize,
}

#[derive(Default)]
struct CohortBuilder {
    roles: BTreeMap<CohortRole, RoleCandidates>,
}

/// Reconcile graduation-cohort rows into one record per (unitid, year).
///
/// Rows with cohort types outside both schemes are ignored; an institution-year
/// with only such rows yields no record.
pub fn reconcile_cohorts(rows: &[CohortRow]) -> CohortReconciliation {
    let mut builders: BTreeMap<FactKey, CohortBuilder> = BTreeMap::new();
    let mut duplicates = 0;

    for row in rows {
        let Some((scheme, role)) = classify_cohort_type(row.cohort_type) else {
            continue;
        };
        let counts = CohortCounts {
            total: row.total,
            demographics: row.demographics,
        };
        let accepted = builders
            .entry((row.unitid, row.year))
            .or_default()
            .roles
            .entry(role)
            .or_default()
            .offer(scheme, counts);
        if !accepted {
            duplicates += 1;
            log_warning_indent(
                format!(
                    "unitid {} year {}: duplicate GRTYPE {} row ignored",
                    row.unitid, row.year, row.cohort_type
                ),
                1,
            );
        }
    }

    let mut result = CohortReconciliation {
        duplicates,
        ..Default::default()
    };

    for ((unitid, year), builder) in builders {
        for (role, candidates) in &builder.roles {
            if candidates.has_both_schemes() {
                let totals = candidates.totals();
                let overlap = SchemeOverlap {
                    unitid,
                    year,
                    role: *role,
                    two_year_total: totals[0],
                    four_year_total: totals[1],
                };
                log_warning_indent(
                    format!(
                        "unitid {} year {}: {} reported under both schemes ({}), using two-year value",
                        unitid,
                        year,
                        role.as_str(),
                        if overlap.totals_conflict() {
                            format!(
                                "totals {} vs {}",
                                fmt_count(overlap.two_year_total),
                                fmt_count(overlap.four_year_total)
                            )
                        } else {
                            "totals agree".to_string()
                        }
                    ),
                    1,
                );
                result.overlaps.push(overlap);
            }
        }

        let resolve = |role: CohortRole| {
            builder
                .roles
                .get(&role)
                .map(RoleCandidates::resolve)
                .unwrap_or_default()
        };

        result.cohorts.insert(
            (unitid, year),
            ReconciledCohort {
                unitid,
                year,
                adjusted_cohort: resolve(CohortRole::AdjustedCohort),
                completers_150: resolve(CohortRole::Completers150),
                transfer_out: resolve(CohortRole::TransferOut),
            },
        );
    }

    if !result.overlaps.is_empty() {
        log_warning(format!(
            "{} cohort role(s) reported under both schemes; two-year values kept",
            result.overlaps.len()
        ));
    }

    result
}

fn fmt_count(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogLevel, LOG_BROADCASTER};
    use tokio::sync::broadcast;

    fn row(unitid: UnitId, year: Year, grtype: i32, total: Option<u32>) -> CohortRow {
        CohortRow {
            unitid,
            year,
            cohort_type: grtype,
            total,
            demographics: Demographics::default(),
        }
    }

    fn with_demo(mut r: CohortRow, hispanic: Option<u32>, white: Option<u32>) -> CohortRow {
        r.demographics.hispanic = hispanic;
        r.demographics.white = white;
        r
    }

    #[test]
    fn test_two_year_scheme_wins() {
        let rows = vec![row(1, 2023, 2, Some(95)), row(1, 2023, 29, Some(120))];
        let result = reconcile_cohorts(&rows);

        let cohort = &result.cohorts[&(1, 2023)];
        assert_eq!(cohort.adjusted_cohort_total(), Some(120));
        assert_eq!(result.overlaps.len(), 1);
        assert!(result.overlaps[0].totals_conflict());
        assert_eq!(result.overlaps[0].two_year_total, Some(120));
        assert_eq!(result.overlaps[0].four_year_total, Some(95));
    }

    #[test]
    fn test_four_year_fallback_never_summed() {
        let rows = vec![
            row(1, 2023, 2, Some(100)),
            row(1, 2023, 3, Some(45)),
            row(1, 2023, 4, Some(10)),
        ];
        let cohort = &reconcile_cohorts(&rows).cohorts[&(1, 2023)];
        assert_eq!(cohort.adjusted_cohort_total(), Some(100));
        assert_eq!(cohort.completers_150_total(), Some(45));
        assert_eq!(cohort.transfer_out_total(), Some(10));
    }

    #[test]
    fn test_missing_role_is_null() {
        let rows = vec![row(1, 2023, 29, Some(80)), row(1, 2023, 30, Some(20))];
        let cohort = &reconcile_cohorts(&rows).cohorts[&(1, 2023)];
        assert_eq!(cohort.transfer_out_total(), None);
        assert_eq!(cohort.transfer_out.demographics, Demographics::default());
    }

    #[test]
    fn test_scheme_resolved_per_year() {
        let rows = vec![row(1, 2022, 2, Some(90)), row(1, 2023, 29, Some(110))];
        let result = reconcile_cohorts(&rows);
        assert_eq!(result.cohorts[&(1, 2022)].adjusted_cohort_total(), Some(90));
        assert_eq!(result.cohorts[&(1, 2023)].adjusted_cohort_total(), Some(110));
        assert!(result.overlaps.is_empty());
    }

    #[test]
    fn test_demographic_fields_coalesce_independently() {
        let rows = vec![
            with_demo(row(1, 2023, 29, Some(120)), None, Some(50)),
            with_demo(row(1, 2023, 2, Some(95)), Some(30), Some(40)),
        ];
        let cohort = &reconcile_cohorts(&rows).cohorts[&(1, 2023)];
        assert_eq!(cohort.adjusted_cohort.demographics.white, Some(50));
        assert_eq!(cohort.adjusted_cohort.demographics.hispanic, Some(30));
    }

    #[test]
    fn test_unrelated_types_ignored_and_duplicates_counted() {
        let rows = vec![
            row(1, 2023, 29, Some(120)),
            row(1, 2023, 29, Some(999)),
            row(1, 2023, 12, Some(5)),
            row(2, 2023, 8, Some(5)),
        ];
        let result = reconcile_cohorts(&rows);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.cohorts[&(1, 2023)].adjusted_cohort_total(), Some(120));
        assert!(!result.cohorts.contains_key(&(2, 2023)));
    }

    #[test]
    fn test_overlap_is_logged() {
        let mut rx = LOG_BROADCASTER.subscribe();
        reconcile_cohorts(&[row(424242, 2021, 30, Some(40)), row(424242, 2021, 3, Some(40))]);

        let mut found = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => {
                    if entry.level == LogLevel::Warning
                        && entry.message.contains("424242")
                        && entry.message.contains("totals agree")
                    {
                        found = true;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(found);
    }

    #[test]
    fn test_classify_cohort_type() {
        assert_eq!(
            classify_cohort_type(33),
            Some((CohortScheme::TwoYear, CohortRole::TransferOut))
        );
        assert_eq!(
            classify_cohort_type(3),
            Some((CohortScheme::FourYear, CohortRole::Completers150))
        );
        assert_eq!(classify_cohort_type(31), None);
    }
}
