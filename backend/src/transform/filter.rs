//! Texas public two-year institution filter.
//!
//! An institution qualifies when it is in Texas, active in the survey year,
//! and satisfies at least one [`InclusionRule`]. Rules are independent so
//! colleges that report mixed degree levels (e.g. a few applied bachelor's
//! programs) are still captured.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::records::TWO_YEAR_CARNEGIE_RANGE;
use crate::models::{Institution, UnitId};

pub const TEXAS: &str = "TX";

/// `SECTOR` code for Public, 2-year.
pub const SECTOR_PUBLIC_TWO_YEAR: i32 = 4;
/// `ICLEVEL` code for two-year institutions.
pub const LEVEL_TWO_YEAR: i32 = 2;
/// `HDEGOFR1` code for Associate's degree.
pub const HIGHEST_DEGREE_ASSOCIATE: i32 = 40;

static TWO_YEAR_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(community|junior|technical) college").expect("valid name pattern")
});

/// Independent reasons an institution counts as a public two-year college.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionRule {
    /// Sector is Public 2-year.
    PublicTwoYearSector,
    /// Public and institution level is 2-year.
    PublicTwoYearLevel,
    /// Public with a two-year Carnegie basic classification.
    PublicTwoYearCarnegie,
    /// Public and highest degree offered is the associate.
    PublicAssociateHighest,
    /// Public with a community/junior/technical college name.
    PublicTwoYearName,
}

impl InclusionRule {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PublicTwoYearSector => "sector is Public 2-year",
            Self::PublicTwoYearLevel => "public, 2-year institution level",
            Self::PublicTwoYearCarnegie => "public, two-year Carnegie classification",
            Self::PublicAssociateHighest => "public, associate is highest degree",
            Self::PublicTwoYearName => "public, community/junior/technical college name",
        }
    }
}

/// Every rule (a)-(e) that `inst` satisfies, ignoring the state/active gate.
pub fn qualifying_rules(inst: &Institution) -> Vec<InclusionRule> {
    let mut rules = Vec::new();
    if inst.sector == Some(SECTOR_PUBLIC_TWO_YEAR) {
        rules.push(InclusionRule::PublicTwoYearSector);
    }
    if inst.is_public() {
        if inst.level == Some(LEVEL_TWO_YEAR) {
            rules.push(InclusionRule::PublicTwoYearLevel);
        }
        if inst
            .carnegie_basic
            .is_some_and(|c| TWO_YEAR_CARNEGIE_RANGE.contains(&c))
        {
            rules.push(InclusionRule::PublicTwoYearCarnegie);
        }
        if inst.highest_degree == Some(HIGHEST_DEGREE_ASSOCIATE) {
            rules.push(InclusionRule::PublicAssociateHighest);
        }
        if TWO_YEAR_NAME.is_match(&inst.name) {
            rules.push(InclusionRule::PublicTwoYearName);
        }
    }
    rules
}

/// Whether the row is a Texas public two-year institution active this year.
pub fn is_texas_two_year(inst: &Institution) -> bool {
    inst.state.trim().eq_ignore_ascii_case(TEXAS)
        && inst.is_active()
        && !qualifying_rules(inst).is_empty()
}

/// Result of filtering the multi-year roster.
#[derive(Debug, Clone, Default)]
pub struct InstitutionSet {
    /// Unitids that qualified in any processed year.
    pub unitids: BTreeSet<UnitId>,
    /// Latest qualifying row per institution.
    pub latest: BTreeMap<UnitId, Institution>,
}

impl InstitutionSet {
    pub fn contains(&self, unitid: UnitId) -> bool {
        self.unitids.contains(&unitid)
    }

    pub fn len(&self) -> usize {
        self.unitids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unitids.is_empty()
    }

    pub fn name(&self, unitid: UnitId) -> Option<&str> {
        self.latest.get(&unitid).map(|i| i.name.as_str())
    }
}

/// Filter the roster and keep a stable latest-year snapshot per institution.
pub fn select_institutions(roster: &[Institution]) -> InstitutionSet {
    let mut set = InstitutionSet::default();
    for inst in roster.iter().filter(|i| is_texas_two_year(i)) {
        set.unitids.insert(inst.unitid);
        match set.latest.get(&inst.unitid) {
            Some(existing) if existing.year >= inst.year => {}
            _ => {
                set.latest.insert(inst.unitid, inst.clone());
            }
        }
    }
    set
}
