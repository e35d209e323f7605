//! Fact and dimension composition.
//!
//! The fact table is a full outer join of the three per-(unitid, year)
//! aggregates: the key set is their union and each domain is left-joined, so
//! an institution-year with graduation data but no completions still appears,
//! with null completion columns.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    DemographicGroup, FactKey, InstitutionDimension, LocaleType, OutcomeFact, PeerGroupRow,
};
use crate::transform::cohort::ReconciledCohort;
use crate::transform::completions::CompletionAggregate;
use crate::transform::filter::InstitutionSet;
use crate::transform::peers::PeerGroups;
use crate::transform::rates::{pct, CohortRates};
use crate::transform::retention::{latest_retention, RetentionAggregate};

/// Per-domain aggregates keyed by (unitid, year).
#[derive(Debug, Clone, Copy)]
pub struct OutcomeSources<'a> {
    pub completions: &'a BTreeMap<FactKey, CompletionAggregate>,
    pub cohorts: &'a BTreeMap<FactKey, ReconciledCohort>,
    pub retention: &'a BTreeMap<FactKey, RetentionAggregate>,
}

impl OutcomeSources<'_> {
    /// Union of the keys of every domain.
    pub fn keys(&self) -> BTreeSet<FactKey> {
        self.completions
            .keys()
            .chain(self.cohorts.keys())
            .chain(self.retention.keys())
            .copied()
            .collect()
    }
}

/// One fact row per key in [`OutcomeSources::keys`], ordered by key.
pub fn compose_outcomes(
    institutions: &InstitutionSet,
    sources: OutcomeSources<'_>,
) -> Vec<OutcomeFact> {
    sources
        .keys()
        .into_iter()
        .map(|key @ (unitid, year)| {
            let mut fact = OutcomeFact {
                unitid,
                year,
                institution_name: institutions.name(unitid).map(str::to_string),
                ..Default::default()
            };
            if let Some(c) = sources.completions.get(&key) {
                apply_completions(&mut fact, c);
            }
            if let Some(c) = sources.cohorts.get(&key) {
                apply_graduation(&mut fact, c);
            }
            if let Some(r) = sources.retention.get(&key) {
                apply_retention(&mut fact, r);
            }
            fact
        })
        .collect()
}

fn apply_completions(fact: &mut OutcomeFact, c: &CompletionAggregate) {
    let associate = |g| c.associate.get(g);
    let share = |g| pct(associate(g), Some(c.associate_degrees));

    fact.total_completions = Some(c.total_completions);
    fact.certificates_under_1yr = Some(c.certificates_under_1yr);
    fact.certificates_1_2yr = Some(c.certificates_1_2yr);
    fact.associate_degrees = Some(c.associate_degrees);
    fact.total_certificates = Some(c.total_certificates);
    fact.associate_men = associate(DemographicGroup::Men);
    fact.associate_women = associate(DemographicGroup::Women);
    fact.associate_aian = associate(DemographicGroup::Aian);
    fact.associate_asian = associate(DemographicGroup::Asian);
    fact.associate_black = associate(DemographicGroup::Black);
    fact.associate_hispanic = associate(DemographicGroup::Hispanic);
    fact.associate_nhpi = associate(DemographicGroup::Nhpi);
    fact.associate_white = associate(DemographicGroup::White);
    fact.associate_two_or_more = associate(DemographicGroup::TwoOrMore);
    fact.associate_unknown = associate(DemographicGroup::Unknown);
    fact.associate_nonresident = associate(DemographicGroup::Nonresident);
    fact.pct_associate_hispanic = share(DemographicGroup::Hispanic);
    fact.pct_associate_black = share(DemographicGroup::Black);
    fact.pct_associate_white = share(DemographicGroup::White);
    fact.pct_associate_asian = share(DemographicGroup::Asian);
}

fn apply_graduation(fact: &mut OutcomeFact, cohort: &ReconciledCohort) {
    let rates = CohortRates::compute(cohort);

    fact.adjusted_cohort = cohort.adjusted_cohort_total();
    fact.completers_150 = cohort.completers_150_total();
    fact.transfer_out = cohort.transfer_out_total();
    fact.graduation_rate_150 = rates.graduation_rate_150;
    fact.transfer_out_rate = rates.transfer_out_rate;
    fact.success_rate = rates.success_rate;
    fact.grad_rate_men = rates.grad_rate_men;
    fact.grad_rate_women = rates.grad_rate_women;
    fact.grad_rate_hispanic = rates.grad_rate_hispanic;
    fact.grad_rate_black = rates.grad_rate_black;
    fact.grad_rate_white = rates.grad_rate_white;
    fact.grad_rate_asian = rates.grad_rate_asian;
    fact.grad_rate_two_or_more = rates.grad_rate_two_or_more;
    fact.equity_gap_hispanic = rates.equity_gap_hispanic;
    fact.equity_gap_black = rates.equity_gap_black;
    fact.equity_gap_asian = rates.equity_gap_asian;
    fact.equity_gap_two_or_more = rates.equity_gap_two_or_more;
}

fn apply_retention(fact: &mut OutcomeFact, r: &RetentionAggregate) {
    fact.full_time_retention_rate = r.full_time_retention_rate;
    fact.part_time_retention_rate = r.part_time_retention_rate;
    fact.full_time_cohort = r.full_time_cohort;
    fact.full_time_retained = r.full_time_retained;
    fact.part_time_cohort = r.part_time_cohort;
    fact.part_time_retained = r.part_time_retained;
    fact.blended_retention_rate = r.blended_retention_rate;
    fact.student_faculty_ratio = r.student_faculty_ratio;
}

/// One dimension row per selected institution.
pub fn compose_dimension(
    institutions: &InstitutionSet,
    peers: &PeerGroups,
    retention: &BTreeMap<FactKey, RetentionAggregate>,
) -> Vec<InstitutionDimension> {
    let latest_retention = latest_retention(retention);

    institutions
        .latest
        .values()
        .map(|inst| {
            let assignment = peers.get(inst.unitid);
            let profile = peers.enrollment.get(&inst.unitid);
            let ret = latest_retention.get(&inst.unitid);

            InstitutionDimension {
                unitid: inst.unitid,
                year: inst.year,
                institution_name: inst.name.clone(),
                city: inst.city.clone(),
                state: inst.state.clone(),
                sector: inst.sector,
                control: inst.control,
                iclevel: inst.level,
                carnegie_basic: inst.carnegie_basic,
                highest_degree: inst.highest_degree,
                locale: inst.locale,
                locale_type: inst
                    .locale
                    .and_then(LocaleType::from_code)
                    .map(|l| l.to_string()),
                size_category: inst.size_category,
                latitude: inst.latitude,
                longitude: inst.longitude,
                website: inst.website.clone(),

                peer_group_key: assignment.map(|a| a.group.key()),
                size_tier: assignment.map(|a| a.group.size_tier),
                is_hsi: assignment.map(|a| a.group.is_hsi),
                pell_tier: assignment.map(|a| a.group.pell_tier),
                urbanicity: assignment.map(|a| a.group.urbanicity),

                enrollment_year: profile.map(|p| p.year),
                total_enrollment: profile.and_then(|p| p.total_enrollment),
                pct_hispanic: profile.and_then(|p| p.share(DemographicGroup::Hispanic)),
                pct_black: profile.and_then(|p| p.share(DemographicGroup::Black)),
                pct_white: profile.and_then(|p| p.share(DemographicGroup::White)),
                pct_asian: profile.and_then(|p| p.share(DemographicGroup::Asian)),
                pell_year: assignment.and_then(|a| a.pell_year),
                pell_pct: assignment.and_then(|a| a.pell_pct),

                retention_year: ret.map(|r| r.year),
                full_time_retention_rate: ret.and_then(|r| r.full_time_retention_rate),
                part_time_retention_rate: ret.and_then(|r| r.part_time_retention_rate),
                blended_retention_rate: ret.and_then(|r| r.blended_retention_rate),
                student_faculty_ratio: ret.and_then(|r| r.student_faculty_ratio),
            }
        })
        .collect()
}

/// `int_peer_groups` rows, one per classified institution.
pub fn compose_peer_groups(institutions: &InstitutionSet, peers: &PeerGroups) -> Vec<PeerGroupRow> {
    peers
        .assignments
        .values()
        .map(|a| PeerGroupRow {
            unitid: a.unitid,
            institution_name: institutions.name(a.unitid).map(str::to_string),
            enrollment_year: a.enrollment_year,
            total_enrollment: a.total_enrollment,
            pct_hispanic: a.pct_hispanic,
            pct_black: a.pct_black,
            pct_white: a.pct_white,
            pct_asian: a.pct_asian,
            pell_year: a.pell_year,
            pell_pct: a.pell_pct,
            locale_type: a.locale_type.map(|l| l.to_string()),
            size_tier: a.group.size_tier,
            is_hsi: a.group.is_hsi,
            pell_tier: a.group.pell_tier,
            urbanicity: a.group.urbanicity,
            peer_group_key: a.group.key(),
        })
        .collect()
}
