//! Peer comparison and equity dashboard reports.
//!
//! Both are derived from the fact table. Peer means are taken per
//! (peer key, year) over the institutions sharing that key, including the
//! institution itself.

use std::collections::BTreeMap;

use crate::models::{
    DemographicGroup, EquityDashboardRow, OutcomeFact, PeerComparisonRow, PeerTier, Year,
};
use crate::transform::filter::InstitutionSet;
use crate::transform::peers::{PeerGroup, PeerGroups};
use crate::transform::rates::{completion_equity_index, gap_severity, round1};

/// Points above or below the peer mean beyond which an institution leaves the
/// "At Peer Average" band.
pub const PEER_TIER_BAND: f64 = 5.0;

/// Mean of the present values, rounded to one decimal.
pub fn mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round1(sum / f64::from(count)))
}

/// Institution minus peer mean, rounded to one decimal.
pub fn peer_difference(value: Option<f64>, peer_mean: Option<f64>) -> Option<f64> {
    match (value, peer_mean) {
        (Some(v), Some(m)) => Some(round1(v - m)),
        _ => None,
    }
}

/// A difference of exactly ±5 points stays "At Peer Average".
pub fn peer_tier(difference: Option<f64>) -> Option<PeerTier> {
    difference.map(|d| {
        if d > PEER_TIER_BAND {
            PeerTier::AbovePeers
        } else if d < -PEER_TIER_BAND {
            PeerTier::BelowPeers
        } else {
            PeerTier::AtPeerAverage
        }
    })
}

/// One metric compared against the peer mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerMetric {
    pub value: Option<f64>,
    pub peer_avg: Option<f64>,
    pub difference: Option<f64>,
    pub tier: Option<PeerTier>,
}

impl PeerMetric {
    fn compare(
        value: Option<f64>,
        peers: &[&OutcomeFact],
        metric: fn(&OutcomeFact) -> Option<f64>,
    ) -> Self {
        let peer_avg = mean(peers.iter().map(|f| metric(*f)));
        let difference = peer_difference(value, peer_avg);
        Self {
            value,
            peer_avg,
            difference,
            tier: peer_tier(difference),
        }
    }
}

/// `rpt_peer_comparison`: one row per fact row whose institution has a peer group.
pub fn build_peer_comparison(
    institutions: &InstitutionSet,
    facts: &[OutcomeFact],
    peers: &PeerGroups,
) -> Vec<PeerComparisonRow> {
    let mut cohorts: BTreeMap<(PeerGroup, Year), Vec<&OutcomeFact>> = BTreeMap::new();
    for fact in facts {
        if let Some(assignment) = peers.get(fact.unitid) {
            cohorts.entry((assignment.group, fact.year)).or_default().push(fact);
        }
    }
    let sizes = peers.group_sizes();

    facts
        .iter()
        .filter_map(|fact| {
            let group = peers.get(fact.unitid)?.group;
            let same_year = cohorts.get(&(group, fact.year)).map(Vec::as_slice).unwrap_or(&[]);

            let grad =
                PeerMetric::compare(fact.graduation_rate_150, same_year, |f| f.graduation_rate_150);
            let success = PeerMetric::compare(fact.success_rate, same_year, |f| f.success_rate);
            let retention = PeerMetric::compare(
                fact.full_time_retention_rate,
                same_year,
                |f| f.full_time_retention_rate,
            );

            Some(PeerComparisonRow {
                unitid: fact.unitid,
                year: fact.year,
                institution_name: institutions.name(fact.unitid).map(str::to_string),
                peer_group_key: group.key(),
                size_tier: group.size_tier,
                is_hsi: group.is_hsi,
                pell_tier: group.pell_tier,
                urbanicity: group.urbanicity,
                peer_group_size: sizes.get(&group).copied().unwrap_or(0) as u32,

                graduation_rate_150: grad.value,
                peer_avg_grad_rate: grad.peer_avg,
                grad_rate_vs_peers: grad.difference,
                grad_rate_tier: grad.tier,

                success_rate: success.value,
                peer_avg_success_rate: success.peer_avg,
                success_rate_vs_peers: success.difference,
                success_rate_tier: success.tier,

                full_time_retention_rate: retention.value,
                peer_avg_retention_rate: retention.peer_avg,
                retention_rate_vs_peers: retention.difference,
                retention_rate_tier: retention.tier,
            })
        })
        .collect()
}

/// `rpt_equity_dashboard`: one row per fact row.
///
/// Completion equity indices compare each year's associate-degree shares with
/// the enrollment shares of the latest enrollment snapshot.
pub fn build_equity_dashboard(
    institutions: &InstitutionSet,
    facts: &[OutcomeFact],
    peers: &PeerGroups,
) -> Vec<EquityDashboardRow> {
    facts
        .iter()
        .map(|fact| {
            let inst = institutions.latest.get(&fact.unitid);
            let group = peers.get(fact.unitid).map(|a| a.group);
            let profile = peers.enrollment.get(&fact.unitid);
            let share = |g| profile.and_then(|p| p.share(g));

            let pct_hispanic = share(DemographicGroup::Hispanic);
            let pct_black = share(DemographicGroup::Black);
            let pct_white = share(DemographicGroup::White);
            let pct_asian = share(DemographicGroup::Asian);

            EquityDashboardRow {
                unitid: fact.unitid,
                year: fact.year,
                institution_name: fact.institution_name.clone(),
                city: inst.and_then(|i| i.city.clone()),
                peer_group_key: group.map(|g| g.key()),
                size_tier: group.map(|g| g.size_tier),
                is_hsi: group.map(|g| g.is_hsi),
                pell_tier: group.map(|g| g.pell_tier),
                urbanicity: group.map(|g| g.urbanicity),
                total_enrollment: profile.and_then(|p| p.total_enrollment),
                pct_hispanic,
                pct_black,
                pct_white,
                pct_asian,

                graduation_rate_150: fact.graduation_rate_150,
                grad_rate_hispanic: fact.grad_rate_hispanic,
                grad_rate_black: fact.grad_rate_black,
                grad_rate_white: fact.grad_rate_white,
                grad_rate_asian: fact.grad_rate_asian,
                grad_rate_two_or_more: fact.grad_rate_two_or_more,
                full_time_retention_rate: fact.full_time_retention_rate,
                part_time_retention_rate: fact.part_time_retention_rate,

                equity_gap_hispanic: fact.equity_gap_hispanic,
                hispanic_gap_severity: gap_severity(fact.equity_gap_hispanic),
                equity_gap_black: fact.equity_gap_black,
                black_gap_severity: gap_severity(fact.equity_gap_black),
                equity_gap_asian: fact.equity_gap_asian,
                asian_gap_severity: gap_severity(fact.equity_gap_asian),
                equity_gap_two_or_more: fact.equity_gap_two_or_more,
                two_or_more_gap_severity: gap_severity(fact.equity_gap_two_or_more),

                pct_associate_hispanic: fact.pct_associate_hispanic,
                pct_associate_black: fact.pct_associate_black,
                pct_associate_white: fact.pct_associate_white,
                pct_associate_asian: fact.pct_associate_asian,
                hispanic_completion_equity_index: completion_equity_index(
                    fact.pct_associate_hispanic,
                    pct_hispanic,
                ),
                black_completion_equity_index: completion_equity_index(
                    fact.pct_associate_black,
                    pct_black,
                ),
                white_completion_equity_index: completion_equity_index(
                    fact.pct_associate_white,
                    pct_white,
                ),
                asian_completion_equity_index: completion_equity_index(
                    fact.pct_associate_asian,
                    pct_asian,
                ),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerThresholds;
    use crate::models::{Demographics, EnrollmentRow, GapSeverity, Institution, UnitId};
    use crate::transform::filter::select_institutions;
    use crate::transform::filter::tests::institution;
    use crate::transform::peers::assign_peer_groups;

    fn college(unitid: UnitId) -> Institution {
        Institution {
            sector: Some(4),
            ..institution(unitid, "Peer Community College")
        }
    }

    fn enrolled(unitid: UnitId, total: u32, hispanic: u32) -> EnrollmentRow {
        EnrollmentRow {
            unitid,
            year: 2024,
            student_level: 1,
            total: Some(total),
            demographics: Demographics { hispanic: Some(hispanic), ..Default::default() },
        }
    }

    fn fact(unitid: UnitId, grad: Option<f64>) -> OutcomeFact {
        OutcomeFact {
            unitid,
            year: 2024,
            graduation_rate_150: grad,
            ..Default::default()
        }
    }

    fn peer_setup(unitids: &[UnitId]) -> (InstitutionSet, PeerGroups) {
        let set = select_institutions(&unitids.iter().map(|u| college(*u)).collect::<Vec<_>>());
        let enrollment: Vec<EnrollmentRow> =
            unitids.iter().map(|u| enrolled(*u, 6000, 600)).collect();
        let peers = assign_peer_groups(&set, &enrollment, &[], &PeerThresholds::default());
        (set, peers)
    }

    #[test]
    fn test_peer_tier_band_is_strict() {
        assert_eq!(peer_tier(Some(5.0)), Some(PeerTier::AtPeerAverage));
        assert_eq!(peer_tier(Some(6.0)), Some(PeerTier::AbovePeers));
        assert_eq!(peer_tier(Some(-5.0)), Some(PeerTier::AtPeerAverage));
        assert_eq!(peer_tier(Some(-5.1)), Some(PeerTier::BelowPeers));
        assert_eq!(peer_tier(None), None);
    }

    #[test]
    fn test_peer_average_of_three() {
        let (set, peers) = peer_setup(&[1, 2, 3]);
        let facts = vec![fact(1, Some(40.0)), fact(2, Some(50.0)), fact(3, Some(60.0))];

        let rows = build_peer_comparison(&set, &facts, &peers);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.peer_avg_grad_rate == Some(50.0)));
        assert!(rows.iter().all(|r| r.peer_group_size == 3));
        assert_eq!(rows[0].grad_rate_tier, Some(PeerTier::BelowPeers));
        assert_eq!(rows[1].grad_rate_tier, Some(PeerTier::AtPeerAverage));
        assert_eq!(rows[2].grad_rate_vs_peers, Some(10.0));

        assert_eq!(
            peer_tier(peer_difference(Some(55.0), Some(50.0))),
            Some(PeerTier::AtPeerAverage)
        );
        assert_eq!(peer_tier(peer_difference(Some(56.0), Some(50.0))), Some(PeerTier::AbovePeers));
    }

    #[test]
    fn test_null_metrics_excluded_from_mean() {
        let (set, peers) = peer_setup(&[1, 2, 3]);
        let facts = vec![fact(1, Some(40.0)), fact(2, None), fact(3, Some(61.0))];

        let rows = build_peer_comparison(&set, &facts, &peers);
        assert_eq!(rows[0].peer_avg_grad_rate, Some(50.5));
        assert_eq!(rows[1].grad_rate_vs_peers, None);
        assert_eq!(rows[1].grad_rate_tier, None);
        assert_eq!(rows[0].peer_avg_success_rate, None);
    }

    #[test]
    fn test_institutions_without_group_skipped() {
        let (set, peers) = peer_setup(&[1]);
        let facts = vec![fact(1, Some(40.0)), fact(2, Some(50.0))];
        let rows = build_peer_comparison(&set, &facts, &peers);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unitid, 1);
    }

    #[test]
    fn test_equity_dashboard_indices_and_severity() {
        let set = select_institutions(&[college(12345)]);
        let peers = assign_peer_groups(
            &set,
            &[enrolled(12345, 8000, 2000)],
            &[],
            &PeerThresholds::default(),
        );
        let facts = vec![OutcomeFact {
            unitid: 12345,
            year: 2024,
            associate_degrees: Some(80),
            associate_hispanic: Some(40),
            pct_associate_hispanic: Some(50.0),
            equity_gap_hispanic: Some(12.3),
            equity_gap_black: Some(-1.0),
            ..Default::default()
        }];

        let rows = build_equity_dashboard(&set, &facts, &peers);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.pct_hispanic, Some(25.0));
        assert_eq!(row.hispanic_completion_equity_index, Some(2.0));
        assert_eq!(row.black_completion_equity_index, None);
        assert_eq!(row.hispanic_gap_severity, GapSeverity::LargeGap);
        assert_eq!(row.black_gap_severity, GapSeverity::NoGap);
        assert_eq!(row.asian_gap_severity, GapSeverity::InsufficientData);
        assert_eq!(row.is_hsi, Some(true));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean([Some(1.0), None, Some(2.0)]), Some(1.5));
        assert_eq!(mean([None, None]), None);
        assert_eq!(mean(std::iter::empty()), None);
    }
}
