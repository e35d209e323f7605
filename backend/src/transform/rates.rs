//! Rate arithmetic.
//!
//! Every rate is a percentage rounded to one decimal. A missing or zero
//! denominator yields `None`, never zero and never an error.

use serde::Serialize;

use crate::models::{DemographicGroup, GapSeverity};
use crate::transform::cohort::ReconciledCohort;

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

/// `round(num * 100 / den, 1)`; `None` when either side is missing or `den` is zero.
pub fn pct(num: Option<u32>, den: Option<u32>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0 => Some(round1(f64::from(n) * 100.0 / f64::from(d))),
        _ => None,
    }
}

/// Completers within 150% time over the adjusted cohort.
pub fn graduation_rate(cohort: &ReconciledCohort) -> Option<f64> {
    pct(cohort.completers_150_total(), cohort.adjusted_cohort_total())
}

pub fn transfer_out_rate(cohort: &ReconciledCohort) -> Option<f64> {
    pct(cohort.transfer_out_total(), cohort.adjusted_cohort_total())
}

/// Completers plus transfer-outs (missing transfers count as zero).
pub fn success_rate(cohort: &ReconciledCohort) -> Option<f64> {
    let successes = cohort
        .completers_150_total()
        .map(|c| c + cohort.transfer_out_total().unwrap_or(0));
    pct(successes, cohort.adjusted_cohort_total())
}

/// Graduation rate for one group, against that group's own cohort.
pub fn group_graduation_rate(cohort: &ReconciledCohort, group: DemographicGroup) -> Option<f64> {
    pct(
        cohort.completers_150.demographics.get(group),
        cohort.adjusted_cohort.demographics.get(group),
    )
}

/// White rate minus group rate, each rounded to one decimal first.
///
/// The difference of rounded rates can differ by 0.1 from the rounded
/// difference of raw rates; the rounded-first form is the reported one.
pub fn equity_gap(white_rate: Option<f64>, group_rate: Option<f64>) -> Option<f64> {
    match (white_rate, group_rate) {
        (Some(w), Some(g)) => Some(round1(round1(w) - round1(g))),
        _ => None,
    }
}

pub fn gap_severity(gap: Option<f64>) -> GapSeverity {
    match gap {
        None => GapSeverity::InsufficientData,
        Some(g) if g >= 10.0 => GapSeverity::LargeGap,
        Some(g) if g >= 5.0 => GapSeverity::ModerateGap,
        Some(g) if g > 0.0 => GapSeverity::SmallGap,
        Some(_) => GapSeverity::NoGap,
    }
}

/// Full- and part-time retained over full- and part-time cohorts.
pub fn blended_retention(
    full_time_retained: Option<u32>,
    part_time_retained: Option<u32>,
    full_time_cohort: Option<u32>,
    part_time_cohort: Option<u32>,
) -> Option<f64> {
    let retained = full_time_retained.unwrap_or(0) + part_time_retained.unwrap_or(0);
    let cohort = full_time_cohort.unwrap_or(0) + part_time_cohort.unwrap_or(0);
    pct(Some(retained), Some(cohort))
}

/// Completion share over enrollment share, rounded to two decimals.
///
/// Above 1.0 the group is overrepresented among completers.
pub fn completion_equity_index(
    completion_pct: Option<f64>,
    enrollment_pct: Option<f64>,
) -> Option<f64> {
    match (completion_pct, enrollment_pct) {
        (Some(c), Some(e)) if e != 0.0 => Some(round_to(c / e, 2)),
        _ => None,
    }
}

/// Graduation metrics for one reconciled cohort.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortRates {
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
}

impl CohortRates {
    pub fn compute(cohort: &ReconciledCohort) -> Self {
        let rate = |group| group_graduation_rate(cohort, group);
        let white = rate(DemographicGroup::White);
        let hispanic = rate(DemographicGroup::Hispanic);
        let black = rate(DemographicGroup::Black);
        let asian = rate(DemographicGroup::Asian);
        let two_or_more = rate(DemographicGroup::TwoOrMore);

        Self {
            graduation_rate_150: graduation_rate(cohort),
            transfer_out_rate: transfer_out_rate(cohort),
            success_rate: success_rate(cohort),
            grad_rate_men: rate(DemographicGroup::Men),
            grad_rate_women: rate(DemographicGroup::Women),
            grad_rate_hispanic: hispanic,
            grad_rate_black: black,
            grad_rate_white: white,
            grad_rate_asian: asian,
            grad_rate_two_or_more: two_or_more,
            equity_gap_hispanic: equity_gap(white, hispanic),
            equity_gap_black: equity_gap(white, black),
            equity_gap_asian: equity_gap(white, asian),
            equity_gap_two_or_more: equity_gap(white, two_or_more),
        }
    }
}
