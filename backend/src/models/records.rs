//! Typed rows of the raw IPEDS extracts.
//!
//! One struct per survey. Every field the pipeline reads is named here so a
//! renamed or dropped survey column fails at load time instead of turning into
//! silent nulls downstream.

use serde::{Deserialize, Serialize};

use super::{Demographics, UnitId, Year};

/// Carnegie basic classification codes treated as two-year colleges.
pub const TWO_YEAR_CARNEGIE_RANGE: std::ops::RangeInclusive<i32> = 2..=10;

/// HD row: one institution in one survey year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub unitid: UnitId,
    pub year: Year,
    pub name: String,
    pub city: Option<String>,
    /// Two-letter state abbreviation (`STABBR`).
    pub state: String,
    /// `SECTOR`: 4 = Public, 2-year.
    pub sector: Option<i32>,
    /// `CONTROL`: 1 = Public.
    pub control: Option<i32>,
    /// `ICLEVEL`: 2 = at least 2 but less than 4 years.
    pub level: Option<i32>,
    /// Carnegie basic classification (`C21BASIC` or an earlier edition).
    pub carnegie_basic: Option<i32>,
    /// `HDEGOFR1`: 40 = Associate's degree.
    pub highest_degree: Option<i32>,
    /// `LOCALE`: two-digit urban-centric locale.
    pub locale: Option<i32>,
    /// `INSTSIZE`: IPEDS size category.
    pub size_category: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub website: Option<String>,
    /// `CYACTIVE`: 1 = active in the current survey year.
    pub active_code: Option<i32>,
}

impl Institution {
    pub fn is_active(&self) -> bool {
        self.active_code == Some(1)
    }

    pub fn is_public(&self) -> bool {
        self.control == Some(1)
    }
}

/// GR row: one cohort-type line for one institution and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub unitid: UnitId,
    pub year: Year,
    /// `GRTYPE`: cohort-type code (29/30/33 two-year scheme, 2/3/4 four-year scheme).
    pub cohort_type: i32,
    pub total: Option<u32>,
    pub demographics: Demographics,
}

/// C_A row: completions for one program and award level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRow {
    pub unitid: UnitId,
    pub year: Year,
    /// `CIPCODE` as written in the extract (`99` is the all-programs total).
    pub cip_code: String,
    pub major_number: i32,
    pub award_level: i32,
    pub total: Option<u32>,
    pub demographics: Demographics,
}

/// EFFY row: 12-month unduplicated headcount at one student level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRow {
    pub unitid: UnitId,
    pub year: Year,
    /// `EFFYLEV`: 1 = all students.
    pub student_level: i32,
    pub total: Option<u32>,
    pub demographics: Demographics,
}

/// SFA row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialAidRow {
    pub unitid: UnitId,
    pub year: Year,
    /// `PGRNT_P`: percent of students awarded Pell grants.
    pub pell_pct: Option<f64>,
}

/// EF_D row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRow {
    pub unitid: UnitId,
    pub year: Year,
    /// `RET_PCF`
    pub full_time_rate: Option<f64>,
    /// `RET_PCP`
    pub part_time_rate: Option<f64>,
    /// `RRFTCTA`
    pub full_time_cohort: Option<u32>,
    /// `RET_NMF`
    pub full_time_retained: Option<u32>,
    /// `RRPTCTA`
    pub part_time_cohort: Option<u32>,
    /// `RET_NMP`
    pub part_time_retained: Option<u32>,
    /// `STUFACR`
    pub student_faculty_ratio: Option<f64>,
}
