//! Completions aggregation.
//!
//! The C_A extract carries one row per (CIP code, award level, major number).
//! Only the grand-total program rows (`CIPCODE` 99, first major) are summed so
//! program-level rows are never double counted.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{CompletionRow, Demographics, FactKey, UnitId, Year};

/// `AWLEVEL` for awards of less than one academic year.
pub const AWARD_CERT_UNDER_1YR: i32 = 1;
/// `AWLEVEL` for awards of at least one but less than two academic years.
pub const AWARD_CERT_1_2YR: i32 = 2;
/// `AWLEVEL` for associate's degrees.
pub const AWARD_ASSOCIATE: i32 = 3;

const GRAND_TOTAL_CIP: f64 = 99.0;
const FIRST_MAJOR: i32 = 1;

/// Whether the row is the all-programs total for the first major.
///
/// `CIPCODE` is matched numerically so `99`, `99.0000` and `99.` all count.
pub fn is_grand_total(row: &CompletionRow) -> bool {
    row.major_number == FIRST_MAJOR
        && row
            .cip_code
            .trim()
            .parse::<f64>()
            .is_ok_and(|cip| cip == GRAND_TOTAL_CIP)
}

/// Per (unitid, year) award counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionAggregate {
    pub unitid: UnitId,
    pub year: Year,
    pub total_completions: u32,
    pub certificates_under_1yr: u32,
    pub certificates_1_2yr: u32,
    pub associate_degrees: u32,
    pub total_certificates: u32,
    /// Associate's-degree breakdown; every field is `Some`.
    pub associate: Demographics,
}

impl CompletionAggregate {
    fn empty(unitid: UnitId, year: Year) -> Self {
        Self {
            unitid,
            year,
            total_completions: 0,
            certificates_under_1yr: 0,
            certificates_1_2yr: 0,
            associate_degrees: 0,
            total_certificates: 0,
            associate: Demographics::zeroed(),
        }
    }

    fn add(&mut self, row: &CompletionRow) {
        let total = row.total.unwrap_or(0);
        self.total_completions += total;
        match row.award_level {
            AWARD_CERT_UNDER_1YR => {
                self.certificates_under_1yr += total;
                self.total_certificates += total;
            }
            AWARD_CERT_1_2YR => {
                self.certificates_1_2yr += total;
                self.total_certificates += total;
            }
            AWARD_ASSOCIATE => {
                self.associate_degrees += total;
                self.associate.accumulate(&row.demographics);
            }
            _ => {}
        }
    }
}

/// Conditional sums over the grand-total rows, keyed by (unitid, year).
///
/// Institution-years with no grand-total row produce no aggregate; missing
/// award levels within a present institution-year are zero.
pub fn aggregate_completions(rows: &[CompletionRow]) -> BTreeMap<FactKey, CompletionAggregate> {
    let mut aggregates: BTreeMap<FactKey, CompletionAggregate> = BTreeMap::new();
    for row in rows.iter().filter(|r| is_grand_total(r)) {
        aggregates
            .entry((row.unitid, row.year))
            .or_insert_with(|| CompletionAggregate::empty(row.unitid, row.year))
            .add(row);
    }
    aggregates
}
