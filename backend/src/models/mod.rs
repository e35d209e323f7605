//! Domain models for the benchmarking pipeline.
//!
//! - [`Survey`] - The six IPEDS survey extracts the pipeline reads
//! - [`Demographics`] - Race/ethnicity and gender breakdown with named optional counts
//! - [`DemographicGroup`] - Addresses one field of [`Demographics`]
//! - [`SizeTier`], [`PellTier`], [`Urbanicity`] - Peer-group key components
//! - [`PeerTier`], [`GapSeverity`] - Report classifications
//!
//! Raw extract rows live in [`records`]; published rows in [`tables`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod records;
pub mod tables;

pub use records::{
    CohortRow, CompletionRow, EnrollmentRow, FinancialAidRow, Institution, RetentionRow,
};
pub use tables::{
    EquityDashboardRow, InstitutionDimension, OutcomeFact, PeerComparisonRow, PeerGroupRow,
    TableName, Tables,
};

/// IPEDS institution identifier.
pub type UnitId = u32;

/// Survey year.
pub type Year = u16;

/// Key of every per-institution, per-year table.
pub type FactKey = (UnitId, Year);

// =============================================================================
// Survey
// =============================================================================

/// One of the raw IPEDS extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Survey {
    /// HD - Institutional characteristics.
    Institutions,
    /// C_A - Completions by award level.
    Completions,
    /// EFFY - 12-month enrollment.
    Enrollment,
    /// GR - Graduation rate cohorts.
    Graduation,
    /// SFA - Student financial aid.
    FinancialAid,
    /// EF_D - Retention and student-faculty ratio.
    Retention,
}

impl Survey {
    /// File prefix used by the extract layout (`<prefix>_<year>.csv`).
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Institutions => "hd",
            Self::Completions => "c_a",
            Self::Enrollment => "effy",
            Self::Graduation => "gr",
            Self::FinancialAid => "sfa",
            Self::Retention => "ef_d",
        }
    }

    pub fn file_name(&self, year: Year) -> String {
        format!("{}_{}.csv", self.file_prefix(), year)
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_prefix().to_uppercase())
    }
}

// =============================================================================
// Demographics
// =============================================================================

/// One demographic breakdown field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemographicGroup {
    Men,
    Women,
    /// American Indian or Alaska Native.
    Aian,
    Asian,
    /// Black or African American.
    Black,
    /// Hispanic or Latino.
    Hispanic,
    /// Native Hawaiian or Other Pacific Islander.
    Nhpi,
    White,
    TwoOrMore,
    /// Race/ethnicity unknown.
    Unknown,
    /// U.S. nonresident.
    Nonresident,
}

impl DemographicGroup {
    pub const ALL: [DemographicGroup; 11] = [
        Self::Men,
        Self::Women,
        Self::Aian,
        Self::Asian,
        Self::Black,
        Self::Hispanic,
        Self::Nhpi,
        Self::White,
        Self::TwoOrMore,
        Self::Unknown,
        Self::Nonresident,
    ];

    /// IPEDS column for this group given a survey prefix (`GR`, `C`, `EFY`)
    /// and the stem used by that survey for gender totals (`TOTL` or `TOTAL`).
    ///
    /// `DemographicGroup::Hispanic.column("GR", "TOTL")` is `GRHISPT`.
    pub fn column(&self, prefix: &str, total_stem: &str) -> String {
        match self {
            Self::Men => format!("{}{}M", prefix, total_stem),
            Self::Women => format!("{}{}W", prefix, total_stem),
            Self::Aian => format!("{}AIANT", prefix),
            Self::Asian => format!("{}ASIAT", prefix),
            Self::Black => format!("{}BKAAT", prefix),
            Self::Hispanic => format!("{}HISPT", prefix),
            Self::Nhpi => format!("{}NHPIT", prefix),
            Self::White => format!("{}WHITT", prefix),
            Self::TwoOrMore => format!("{}2MORT", prefix),
            Self::Unknown => format!("{}UNKNT", prefix),
            Self::Nonresident => format!("{}NRALT", prefix),
        }
    }
}

/// Counts broken out by race/ethnicity and gender.
///
/// `None` means "not reported", which is distinct from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub men: Option<u32>,
    pub women: Option<u32>,
    pub aian: Option<u32>,
    pub asian: Option<u32>,
    pub black: Option<u32>,
    pub hispanic: Option<u32>,
    pub nhpi: Option<u32>,
    pub white: Option<u32>,
    pub two_or_more: Option<u32>,
    pub unknown: Option<u32>,
    pub nonresident: Option<u32>,
}

impl Demographics {
    pub fn get(&self, group: DemographicGroup) -> Option<u32> {
        match group {
            DemographicGroup::Men => self.men,
            DemographicGroup::Women => self.women,
            DemographicGroup::Aian => self.aian,
            DemographicGroup::Asian => self.asian,
            DemographicGroup::Black => self.black,
            DemographicGroup::Hispanic => self.hispanic,
            DemographicGroup::Nhpi => self.nhpi,
            DemographicGroup::White => self.white,
            DemographicGroup::TwoOrMore => self.two_or_more,
            DemographicGroup::Unknown => self.unknown,
            DemographicGroup::Nonresident => self.nonresident,
        }
    }

    pub fn set(&mut self, group: DemographicGroup, value: Option<u32>) {
        let slot = match group {
            DemographicGroup::Men => &mut self.men,
            DemographicGroup::Women => &mut self.women,
            DemographicGroup::Aian => &mut self.aian,
            DemographicGroup::Asian => &mut self.asian,
            DemographicGroup::Black => &mut self.black,
            DemographicGroup::Hispanic => &mut self.hispanic,
            DemographicGroup::Nhpi => &mut self.nhpi,
            DemographicGroup::White => &mut self.white,
            DemographicGroup::TwoOrMore => &mut self.two_or_more,
            DemographicGroup::Unknown => &mut self.unknown,
            DemographicGroup::Nonresident => &mut self.nonresident,
        };
        *slot = value;
    }

    /// Add `other` into `self`, treating unreported counts as zero.
    ///
    /// Every field is `Some` afterwards.
    pub fn accumulate(&mut self, other: &Demographics) {
        for group in DemographicGroup::ALL {
            let sum = self.get(group).unwrap_or(0) + other.get(group).unwrap_or(0);
            self.set(group, Some(sum));
        }
    }

    /// All groups zero-valued rather than unreported.
    pub fn zeroed() -> Self {
        let mut d = Self::default();
        for group in DemographicGroup::ALL {
            d.set(group, Some(0));
        }
        d
    }
}

// =============================================================================
// Peer-group key components
// =============================================================================

/// Enrollment size band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

impl SizeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
        }
    }
}

/// Share of students receiving Pell grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PellTier {
    #[serde(rename = "High Pell")]
    HighPell,
    #[serde(rename = "Lower Pell")]
    LowerPell,
}

impl PellTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighPell => "High Pell",
            Self::LowerPell => "Lower Pell",
        }
    }
}

/// Degree of urbanization, collapsed from the IPEDS locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urbanicity {
    #[serde(rename = "Urban/Suburban")]
    UrbanSuburban,
    #[serde(rename = "Town/Rural")]
    TownRural,
}

impl Urbanicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrbanSuburban => "Urban/Suburban",
            Self::TownRural => "Town/Rural",
        }
    }
}

/// IPEDS locale type (tens digit of the `LOCALE` code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocaleType {
    City,
    Suburb,
    Town,
    Rural,
}

impl LocaleType {
    /// `11`-`13` City, `21`-`23` Suburb, `31`-`33` Town, `41`-`43` Rural.
    pub fn from_code(code: i32) -> Option<Self> {
        match code / 10 {
            1 => Some(Self::City),
            2 => Some(Self::Suburb),
            3 => Some(Self::Town),
            4 => Some(Self::Rural),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::City => "City",
            Self::Suburb => "Suburb",
            Self::Town => "Town",
            Self::Rural => "Rural",
        }
    }
}

// =============================================================================
// Report classifications
// =============================================================================

/// Position of an institution relative to its peer-group mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerTier {
    #[serde(rename = "Above Peers")]
    AbovePeers,
    #[serde(rename = "At Peer Average")]
    AtPeerAverage,
    #[serde(rename = "Below Peers")]
    BelowPeers,
}

impl PeerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AbovePeers => "Above Peers",
            Self::AtPeerAverage => "At Peer Average",
            Self::BelowPeers => "Below Peers",
        }
    }
}

/// Severity of an equity gap (white rate minus group rate, in points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapSeverity {
    #[serde(rename = "Large Gap")]
    LargeGap,
    #[serde(rename = "Moderate Gap")]
    ModerateGap,
    #[serde(rename = "Small Gap")]
    SmallGap,
    #[serde(rename = "No Gap/Outperforming")]
    NoGap,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl GapSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LargeGap => "Large Gap",
            Self::ModerateGap => "Moderate Gap",
            Self::SmallGap => "Small Gap",
            Self::NoGap => "No Gap/Outperforming",
            Self::InsufficientData => "Insufficient Data",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(SizeTier, PellTier, Urbanicity, LocaleType, PeerTier, GapSeverity);

// =============================================================================
// Tests
// =============================================================================
