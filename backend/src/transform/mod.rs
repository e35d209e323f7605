//! Transformation module.
//!
//! Stages, in pipeline order:
//! - Filter: Texas public two-year institution selection
//! - Cohort: two-scheme graduation cohort reconciliation
//! - Completions / Retention: per institution-year aggregates
//! - Rates: percentage, gap and index arithmetic
//! - Peers: peer-group classification from latest snapshots
//! - Compose / Reports: fact, dimension and report tables
//! - Pipeline: loading and orchestration

pub mod cohort;
pub mod completions;
pub mod compose;
pub mod filter;
pub mod peers;
pub mod pipeline;
pub mod rates;
pub mod reports;
pub mod retention;

pub use cohort::{reconcile_cohorts, CohortReconciliation, ReconciledCohort};
pub use completions::{aggregate_completions, CompletionAggregate};
pub use filter::{
    is_texas_two_year, qualifying_rules, select_institutions, InclusionRule, InstitutionSet,
};
pub use peers::{assign_peer_groups, latest_snapshot, PeerGroup, PeerGroups};
pub use pipeline::*;
pub use retention::{aggregate_retention, RetentionAggregate};
