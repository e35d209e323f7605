//! Retention metrics per (unitid, year).

use serde::Serialize;
use std::collections::BTreeMap;

use crate::logs::log_warning_indent;
use crate::models::{FactKey, RetentionRow, UnitId, Year};
use crate::transform::rates::blended_retention;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionAggregate {
    pub unitid: UnitId,
    pub year: Year,
    /// Reported full-time retention rate (percent).
    pub full_time_retention_rate: Option<f64>,
    /// Reported part-time retention rate (percent).
    pub part_time_retention_rate: Option<f64>,
    pub full_time_cohort: Option<u32>,
    pub full_time_retained: Option<u32>,
    pub part_time_cohort: Option<u32>,
    pub part_time_retained: Option<u32>,
    pub student_faculty_ratio: Option<f64>,
    pub blended_retention_rate: Option<f64>,
}

impl From<&RetentionRow> for RetentionAggregate {
    fn from(row: &RetentionRow) -> Self {
        Self {
            unitid: row.unitid,
            year: row.year,
            full_time_retention_rate: row.full_time_rate,
            part_time_retention_rate: row.part_time_rate,
            full_time_cohort: row.full_time_cohort,
            full_time_retained: row.full_time_retained,
            part_time_cohort: row.part_time_cohort,
            part_time_retained: row.part_time_retained,
            student_faculty_ratio: row.student_faculty_ratio,
            blended_retention_rate: blended_retention(
                row.full_time_retained,
                row.part_time_retained,
                row.full_time_cohort,
                row.part_time_cohort,
            ),
        }
    }
}

/// One retention record per (unitid, year); a repeated key keeps the first row.
pub fn aggregate_retention(rows: &[RetentionRow]) -> BTreeMap<FactKey, RetentionAggregate> {
    let mut aggregates = BTreeMap::new();
    for row in rows {
        let key = (row.unitid, row.year);
        if aggregates.contains_key(&key) {
            log_warning_indent(
                format!("unitid {} year {}: duplicate retention row ignored", row.unitid, row.year),
                1,
            );
            continue;
        }
        aggregates.insert(key, RetentionAggregate::from(row));
    }
    aggregates
}

/// Latest retention record per institution.
pub fn latest_retention(
    aggregates: &BTreeMap<FactKey, RetentionAggregate>,
) -> BTreeMap<UnitId, &RetentionAggregate> {
    let mut latest = BTreeMap::new();
    // Keys iterate in (unitid, year) order, so the last write per unitid is its max year.
    for ((unitid, _), agg) in aggregates {
        latest.insert(*unitid, agg);
    }
    latest
}
