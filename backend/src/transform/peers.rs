//! Peer grouping.
//!
//! Institutions are compared against peers sharing four attributes:
//!
//! ```text
//! size tier  ×  HSI status  ×  Pell tier  ×  urbanicity
//! (enrollment)  (enrollment)   (fin. aid)    (locale)
//! ```
//!
//! Enrollment and financial aid are published on different schedules, so each
//! source contributes its own latest-year snapshot (see [`latest_snapshot`]).

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::PeerThresholds;
use crate::logs::log_warning;
use crate::models::{
    DemographicGroup, Demographics, EnrollmentRow, FinancialAidRow, LocaleType, PellTier,
    SizeTier, UnitId, Urbanicity, Year,
};
use crate::transform::filter::InstitutionSet;
use crate::transform::rates::pct;

/// `EFFYLEV` for the all-students enrollment line.
pub const EFFYLEV_ALL_STUDENTS: i32 = 1;

// =============================================================================
// Snapshot selection
// =============================================================================

/// Rows of a source as of its most recent year.
#[derive(Debug, Clone)]
pub struct Snapshot<'a, T> {
    /// Maximum year present in the source; `None` when it is empty.
    pub year: Option<Year>,
    pub rows: Vec<&'a T>,
}

/// Keep the rows whose year equals the maximum year present in `rows`.
pub fn latest_snapshot<T, F>(rows: &[T], year_of: F) -> Snapshot<'_, T>
where
    F: Fn(&T) -> Year,
{
    let year = rows.iter().map(&year_of).max();
    let rows = match year {
        Some(max) => rows.iter().filter(|r| year_of(*r) == max).collect(),
        None => Vec::new(),
    };
    Snapshot { year, rows }
}

// =============================================================================
// Classification
// =============================================================================

pub fn size_tier(total_enrollment: u32, thresholds: &PeerThresholds) -> SizeTier {
    if total_enrollment >= thresholds.min_enrollment_large {
        SizeTier::Large
    } else if total_enrollment >= thresholds.min_enrollment_medium {
        SizeTier::Medium
    } else {
        SizeTier::Small
    }
}

/// Hispanic-Serving Institution; an unknown share is not HSI.
pub fn is_hsi(pct_hispanic: Option<f64>, thresholds: &PeerThresholds) -> bool {
    pct_hispanic.is_some_and(|p| p >= thresholds.hsi_threshold_pct)
}

/// An unknown Pell share is Lower Pell.
pub fn pell_tier(pell_pct: Option<f64>, thresholds: &PeerThresholds) -> PellTier {
    match pell_pct {
        Some(p) if p >= thresholds.high_pell_threshold_pct => PellTier::HighPell,
        _ => PellTier::LowerPell,
    }
}

/// City and suburb are Urban/Suburban; town, rural and unknown are Town/Rural.
pub fn urbanicity(locale: Option<LocaleType>) -> Urbanicity {
    match locale {
        Some(LocaleType::City | LocaleType::Suburb) => Urbanicity::UrbanSuburban,
        _ => Urbanicity::TownRural,
    }
}

/// The four-attribute comparison key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeerGroup {
    pub size_tier: SizeTier,
    pub is_hsi: bool,
    pub pell_tier: PellTier,
    pub urbanicity: Urbanicity,
}

impl PeerGroup {
    /// Readable key, e.g. `Medium|HSI|High Pell|Urban/Suburban`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PeerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.size_tier,
            if self.is_hsi { "HSI" } else { "Non-HSI" },
            self.pell_tier,
            self.urbanicity
        )
    }
}

// =============================================================================
// Assignment
// =============================================================================

/// All-students enrollment for one institution in the snapshot year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentProfile {
    pub unitid: UnitId,
    pub year: Year,
    pub total_enrollment: Option<u32>,
    pub counts: Demographics,
}

impl EnrollmentProfile {
    /// Enrollment share of `group`, in percent.
    pub fn share(&self, group: DemographicGroup) -> Option<f64> {
        pct(self.counts.get(group), self.total_enrollment)
    }
}

/// Peer classification of one institution plus the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerAssignment {
    pub unitid: UnitId,
    pub enrollment_year: Year,
    pub total_enrollment: u32,
    pub pct_hispanic: Option<f64>,
    pub pct_black: Option<f64>,
    pub pct_white: Option<f64>,
    pub pct_asian: Option<f64>,
    pub pell_year: Option<Year>,
    pub pell_pct: Option<f64>,
    pub locale_type: Option<LocaleType>,
    pub group: PeerGroup,
}

/// Output of [`assign_peer_groups`].
#[derive(Debug, Clone, Default)]
pub struct PeerGroups {
    pub enrollment_year: Option<Year>,
    pub aid_year: Option<Year>,
    /// Snapshot enrollment per institution, including those without a group.
    pub enrollment: BTreeMap<UnitId, EnrollmentProfile>,
    pub assignments: BTreeMap<UnitId, PeerAssignment>,
}

impl PeerGroups {
    pub fn get(&self, unitid: UnitId) -> Option<&PeerAssignment> {
        self.assignments.get(&unitid)
    }

    /// Number of institutions per peer key.
    pub fn group_sizes(&self) -> BTreeMap<PeerGroup, usize> {
        let mut sizes = BTreeMap::new();
        for assignment in self.assignments.values() {
            *sizes.entry(assignment.group).or_insert(0) += 1;
        }
        sizes
    }
}

/// Classify every selected institution present in the enrollment snapshot.
pub fn assign_peer_groups(
    institutions: &InstitutionSet,
    enrollment: &[EnrollmentRow],
    financial_aid: &[FinancialAidRow],
    thresholds: &PeerThresholds,
) -> PeerGroups {
    let all_students: Vec<&EnrollmentRow> = enrollment
        .iter()
        .filter(|r| r.student_level == EFFYLEV_ALL_STUDENTS && institutions.contains(r.unitid))
        .collect();
    let enrollment_snapshot = latest_snapshot(&all_students, |r| r.year);
    let aid_rows: Vec<&FinancialAidRow> = financial_aid
        .iter()
        .filter(|r| institutions.contains(r.unitid))
        .collect();
    let aid_snapshot = latest_snapshot(&aid_rows, |r| r.year);

    let mut profiles = BTreeMap::new();
    for row in &enrollment_snapshot.rows {
        profiles.entry(row.unitid).or_insert_with(|| EnrollmentProfile {
            unitid: row.unitid,
            year: row.year,
            total_enrollment: row.total,
            counts: row.demographics,
        });
    }

    let mut pell: BTreeMap<UnitId, Option<f64>> = BTreeMap::new();
    for row in &aid_snapshot.rows {
        pell.entry(row.unitid).or_insert(row.pell_pct);
    }

    let mut assignments = BTreeMap::new();
    let mut missing_totals = 0;
    for (unitid, profile) in &profiles {
        let Some(total) = profile.total_enrollment else {
            missing_totals += 1;
            continue;
        };
        let pct_hispanic = profile.share(DemographicGroup::Hispanic);
        let pell_pct = pell.get(unitid).copied().flatten();
        let locale_type = institutions
            .latest
            .get(unitid)
            .and_then(|i| i.locale)
            .and_then(LocaleType::from_code);

        assignments.insert(
            *unitid,
            PeerAssignment {
                unitid: *unitid,
                enrollment_year: profile.year,
                total_enrollment: total,
                pct_hispanic,
                pct_black: profile.share(DemographicGroup::Black),
                pct_white: profile.share(DemographicGroup::White),
                pct_asian: profile.share(DemographicGroup::Asian),
                pell_year: aid_snapshot.year,
                pell_pct,
                locale_type,
                group: PeerGroup {
                    size_tier: size_tier(total, thresholds),
                    is_hsi: is_hsi(pct_hispanic, thresholds),
                    pell_tier: pell_tier(pell_pct, thresholds),
                    urbanicity: urbanicity(locale_type),
                },
            },
        );
    }

    if missing_totals > 0 {
        log_warning(format!(
            "{} institution(s) have no total enrollment in the snapshot and no peer group",
            missing_totals
        ));
    }

    PeerGroups {
        enrollment_year: enrollment_snapshot.year,
        aid_year: aid_snapshot.year,
        enrollment: profiles,
        assignments,
    }
}
