//! High-level pipeline API.
//!
//! ```text
//!  hd  c_a  effy  gr  sfa  ef_d        (loaded concurrently)
//!   │    │    │    │   │    │
//!   ▼    │    │    │   │    │
//!  Filter ──────── restrict every extract to selected institutions
//!        │    │    │   │    │
//!        ▼    │    ▼   │    ▼
//!   Completions  Cohorts   Retention    (+ rates)
//!        │    ▼        ▼    │
//!        │   Peer groups    │
//!        ▼        ▼         ▼
//!      Fact / dimension / reports  ──▶  validate  ──▶  publish
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use texas_cc::{run_pipeline, OutputOptions, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = run_pipeline(&PipelineConfig::default(), OutputOptions::default()).await?;
//!     println!("{} fact rows", report.summary.fact_rows);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::{
    CohortRow, CompletionRow, EnrollmentRow, FinancialAidRow, Institution, RetentionRow,
    TableName, Tables, UnitId, Year,
};
use crate::output::{publish_tables, OutputOptions, PublishedTable};
use crate::parser::{load_survey, SurveyRecord};
use crate::transform::cohort::reconcile_cohorts;
use crate::transform::completions::aggregate_completions;
use crate::transform::compose::{
    compose_dimension, compose_outcomes, compose_peer_groups, OutcomeSources,
};
use crate::transform::filter::{select_institutions, InstitutionSet};
use crate::transform::peers::assign_peer_groups;
use crate::transform::reports::{build_equity_dashboard, build_peer_comparison};
use crate::transform::retention::aggregate_retention;
use crate::validation::validate_tables;

/// Every extract of a run, already decoded.
#[derive(Debug, Clone, Default)]
pub struct RawExtracts {
    pub institutions: Vec<Institution>,
    pub completions: Vec<CompletionRow>,
    pub enrollment: Vec<EnrollmentRow>,
    pub graduation: Vec<CohortRow>,
    pub financial_aid: Vec<FinancialAidRow>,
    pub retention: Vec<RetentionRow>,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub years: Vec<Year>,
    pub roster_rows: usize,
    pub institutions: usize,
    pub cohort_scheme_overlaps: usize,
    pub duplicate_cohort_rows: usize,
    pub enrollment_snapshot_year: Option<Year>,
    pub financial_aid_snapshot_year: Option<Year>,
    pub peer_groups: usize,
    pub fact_rows: usize,
}

/// In-memory result of the transform stages.
#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub tables: Tables,
    pub summary: RunSummary,
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub output_dir: PathBuf,
    pub published: Vec<PublishedTable>,
}

async fn load<T: SurveyRecord>(dir: PathBuf, years: Vec<Year>) -> PipelineResult<Vec<T>> {
    let rows = tokio::task::spawn_blocking(move || load_survey::<T>(&dir, &years))
        .await
        .map_err(|e| PipelineError::Task(format!("{} loader: {}", T::SURVEY, e)))??;
    log_info_indent(format!("{}: {} rows", T::SURVEY, rows.len()), 1);
    Ok(rows)
}

/// Load every extract for `years` concurrently; any failure aborts the load.
pub async fn load_extracts(dir: &Path, years: &[Year]) -> PipelineResult<RawExtracts> {
    log_info(format!("📖 Loading extracts from {} for {:?}", dir.display(), years));
    let dir = dir.to_path_buf();
    let years = years.to_vec();

    let (institutions, completions, enrollment, graduation, financial_aid, retention) =
        tokio::try_join!(
            load::<Institution>(dir.clone(), years.clone()),
            load::<CompletionRow>(dir.clone(), years.clone()),
            load::<EnrollmentRow>(dir.clone(), years.clone()),
            load::<CohortRow>(dir.clone(), years.clone()),
            load::<FinancialAidRow>(dir.clone(), years.clone()),
            load::<RetentionRow>(dir, years),
        )?;

    Ok(RawExtracts {
        institutions,
        completions,
        enrollment,
        graduation,
        financial_aid,
        retention,
    })
}

fn selected<T: Clone>(rows: &[T], set: &InstitutionSet, unitid: impl Fn(&T) -> UnitId) -> Vec<T> {
    rows.iter().filter(|r| set.contains(unitid(*r))).cloned().collect()
}

/// Run every transform stage in order. Pure: same input, same tables.
pub fn run_transform(raw: &RawExtracts, config: &PipelineConfig) -> Transformed {
    log_info("🔎 Selecting Texas public two-year institutions...");
    let institutions = select_institutions(&raw.institutions);
    log_success(format!(
        "{} institutions selected from {} roster rows",
        institutions.len(),
        raw.institutions.len()
    ));
    if institutions.is_empty() {
        log_warning("No institution qualified; tables will be empty");
    }

    log_info("🔗 Reconciling graduation cohorts...");
    let graduation = selected(&raw.graduation, &institutions, |r| r.unitid);
    let reconciliation = reconcile_cohorts(&graduation);
    log_success(format!("{} institution-year cohorts", reconciliation.cohorts.len()));

    log_info("📊 Aggregating completions and retention...");
    let completions =
        aggregate_completions(&selected(&raw.completions, &institutions, |r| r.unitid));
    let retention = aggregate_retention(&selected(&raw.retention, &institutions, |r| r.unitid));
    log_success(format!(
        "{} completion and {} retention institution-years",
        completions.len(),
        retention.len()
    ));

    log_info("👥 Assigning peer groups...");
    let peers = assign_peer_groups(
        &institutions,
        &raw.enrollment,
        &raw.financial_aid,
        &config.thresholds,
    );
    log_success(format!(
        "{} institutions in {} peer groups (enrollment {}, financial aid {})",
        peers.assignments.len(),
        peers.group_sizes().len(),
        fmt_year(peers.enrollment_year),
        fmt_year(peers.aid_year)
    ));

    log_info("🧱 Composing tables...");
    let sources = OutcomeSources {
        completions: &completions,
        cohorts: &reconciliation.cohorts,
        retention: &retention,
    };
    let outcomes = compose_outcomes(&institutions, sources);
    let tables = Tables {
        institutions: compose_dimension(&institutions, &peers, &retention),
        peer_groups: compose_peer_groups(&institutions, &peers),
        peer_comparison: build_peer_comparison(&institutions, &outcomes, &peers),
        equity_dashboard: build_equity_dashboard(&institutions, &outcomes, &peers),
        outcomes,
    };
    for table in TableName::ALL {
        log_info_indent(format!("{}: {} rows", table, tables.row_count(table)), 1);
    }

    let summary = RunSummary {
        years: config.normalized_years(),
        roster_rows: raw.institutions.len(),
        institutions: institutions.len(),
        cohort_scheme_overlaps: reconciliation.overlaps.len(),
        duplicate_cohort_rows: reconciliation.duplicates,
        enrollment_snapshot_year: peers.enrollment_year,
        financial_aid_snapshot_year: peers.aid_year,
        peer_groups: peers.group_sizes().len(),
        fact_rows: tables.outcomes.len(),
    };

    Transformed { tables, summary }
}

/// Load, transform, validate and publish.
///
/// Nothing is written unless every table was built and validated.
pub async fn run_pipeline(
    config: &PipelineConfig,
    options: OutputOptions,
) -> PipelineResult<RunReport> {
    config.validate()?;
    let years = config.normalized_years();

    let raw = load_extracts(&config.extract_dir, &years).await?;
    let transformed = run_transform(&raw, config);

    log_info("✔️  Validating output tables...");
    validate_tables(&transformed.tables).map_err(|e| {
        log_error(format!("Validation failed: {}", e));
        e
    })?;
    log_success("All tables match their schemas");

    log_info(format!("💾 Writing tables to {}", config.output_dir.display()));
    let published =
        publish_tables(&transformed.tables, &config.output_dir, options).map_err(|e| {
            log_error(format!("Publish to {} failed: {}", config.output_dir.display(), e));
            e
        })?;

    Ok(RunReport {
        summary: transformed.summary,
        output_dir: config.output_dir.clone(),
        published,
    })
}

fn fmt_year(year: Option<Year>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "none".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::logs::{LogLevel, LOG_BROADCASTER};
    use std::fs;
    use tokio::sync::broadcast;

    const HD: &str = "UNITID,INSTNM,CITY,STABBR,SECTOR,CONTROL,ICLEVEL,C21BASIC,HDEGOFR1,LOCALE,INSTSIZE,LATITUDE,LONGITUD,WEBADDR,CYACTIVE";
    const C_A: &str = "UNITID,CIPCODE,MAJORNUM,AWLEVEL,CTOTALT,CTOTALM,CTOTALW,CAIANT,CASIAT,CBKAAT,CHISPT,CNHPIT,CWHITT,C2MORT,CUNKNT,CNRALT";
    const EFFY: &str = "UNITID,EFFYLEV,EFYTOTLT,EFYTOTLM,EFYTOTLW,EFYAIANT,EFYASIAT,EFYBKAAT,EFYHISPT,EFYNHPIT,EFYWHITT,EFY2MORT,EFYUNKNT,EFYNRALT";
    const GR: &str = "UNITID,GRTYPE,GRTOTLT,GRTOTLM,GRTOTLW,GRAIANT,GRASIAT,GRBKAAT,GRHISPT,GRNHPIT,GRWHITT,GR2MORT,GRUNKNT,GRNRALT";
    const SFA: &str = "UNITID,PGRNT_P";
    const EF_D: &str = "UNITID,RET_PCF,RET_PCP,RRFTCTA,RET_NMF,RRPTCTA,RET_NMP,STUFACR";

    fn write(dir: &Path, name: &str, header: &str, rows: &[&str]) {
        let mut content = format!("{}\n", header);
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(name), content).unwrap();
    }

    /// Two Texas colleges, one Oklahoma college, one Texas university.
    fn write_fixture(dir: &Path) {
        write(dir, "hd_2024.csv", HD, &[
            "100,Alpha Community College,Houston,TX,4,1,2,2,40,11,3,29.7,-95.3,alpha.edu,1",
            "200,Beta College,Tyler,TX,4,1,2,3,40,32,2,32.3,-95.3,beta.edu,1",
            "300,Tulsa Community College,Tulsa,OK,4,1,2,2,40,11,4,36.1,-95.9,tulsacc.edu,1",
            "400,Gamma University,Austin,TX,2,2,1,15,20,11,4,30.2,-97.7,gamma.edu,1",
        ]);
        write(dir, "c_a_2024.csv", C_A, &[
            "100,99,1,3,80,30,50,0,2,10,40,0,20,3,3,2",
            "100,99,1,1,20,,,,,,,,,,,",
            "100,51.3801,1,3,15,,,,,,,,,,,",
            "300,99,1,3,500,,,,,,,,,,,",
            "400,99,1,3,70,,,,,,,,,,,",
        ]);
        write(dir, "effy_2024.csv", EFFY, &[
            "100,1,10000,4000,6000,50,300,1500,2500,10,4000,200,100,40",
            "100,2,9000,,,,,,,,,,,",
            "200,1,3000,1200,1800,,,,300,,2000,,,",
        ]);
        write(dir, "gr_2024.csv", GR, &[
            "100,29,120,60,60,0,4,20,40,0,50,3,2,1",
            "100,2,95,,,,,,,,,,,",
            "100,30,54,,,,,,16,,25,,,",
            "100,33,12,,,,,,,,,,,",
            "200,2,100,,,,,,,,0,,,",
            "200,3,45,,,,,,,,0,,,",
            "200,4,10,,,,,,,,,,,",
        ]);
        write(dir, "sfa_2024.csv", SFA, &["100,45", "200,."]);
        write(dir, "ef_d_2024.csv", EF_D, &["100,61,44,500,305,300,132,21", "400,80,,100,80,,,15"]);
    }

    fn config(extract: &Path, output: &Path) -> PipelineConfig {
        PipelineConfig {
            years: vec![2024],
            extract_dir: extract.to_path_buf(),
            output_dir: output.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_fixture(raw_dir.path());
        let config = config(raw_dir.path(), out_dir.path());

        let raw = load_extracts(raw_dir.path(), &[2024]).await.unwrap();
        let result = run_transform(&raw, &config);
        let tables = &result.tables;

        assert_eq!(result.summary.institutions, 2);
        assert_eq!(result.summary.cohort_scheme_overlaps, 1);
        assert_eq!(tables.institutions.len(), 2);

        let keys: Vec<(UnitId, Year)> =
            tables.outcomes.iter().map(|f| (f.unitid, f.year)).collect();
        assert_eq!(keys, vec![(100, 2024), (200, 2024)]);

        let alpha = &tables.outcomes[0];
        assert_eq!(alpha.adjusted_cohort, Some(120));
        assert_eq!(alpha.graduation_rate_150, Some(45.0));
        assert_eq!(alpha.success_rate, Some(55.0));
        assert_eq!(alpha.associate_degrees, Some(80));
        assert_eq!(alpha.total_completions, Some(100));
        assert_eq!(alpha.pct_associate_hispanic, Some(50.0));
        assert_eq!(alpha.grad_rate_hispanic, Some(40.0));
        assert_eq!(alpha.grad_rate_white, Some(50.0));
        assert_eq!(alpha.equity_gap_hispanic, Some(10.0));
        assert_eq!(alpha.full_time_retention_rate, Some(61.0));

        let beta = &tables.outcomes[1];
        assert_eq!(beta.graduation_rate_150, Some(45.0));
        assert_eq!(beta.grad_rate_white, None);
        assert_eq!(beta.equity_gap_hispanic, None);
        assert_eq!(beta.total_completions, None);
        assert_eq!(beta.full_time_retention_rate, None);

        let dashboard = &tables.equity_dashboard[0];
        assert_eq!(dashboard.pct_hispanic, Some(25.0));
        assert_eq!(dashboard.hispanic_completion_equity_index, Some(2.0));

        assert_eq!(tables.peer_groups.len(), 2);
        assert_eq!(tables.peer_groups[0].peer_group_key, "Medium|HSI|High Pell|Urban/Suburban");
        assert_eq!(tables.peer_groups[1].peer_group_key, "Small|Non-HSI|Lower Pell|Town/Rural");
        assert_eq!(tables.peer_comparison.len(), 2);
        assert!(validate_tables(tables).is_ok());
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_fixture(raw_dir.path());
        let config = config(raw_dir.path(), out_dir.path());

        let first = run_pipeline(&config, OutputOptions { json: true }).await.unwrap();
        let first_bytes: Vec<Vec<u8>> = first
            .published
            .iter()
            .map(|t| fs::read(&t.csv_path).unwrap())
            .collect();

        let second = run_pipeline(&config, OutputOptions { json: true }).await.unwrap();
        let second_bytes: Vec<Vec<u8>> = second
            .published
            .iter()
            .map(|t| fs::read(&t.csv_path).unwrap())
            .collect();

        assert_eq!(first.summary, second.summary);
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_missing_extract_aborts_without_output() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_fixture(raw_dir.path());
        fs::remove_file(raw_dir.path().join("sfa_2024.csv")).unwrap();
        let out = out_dir.path().join("marts");

        let err = run_pipeline(&config(raw_dir.path(), &out), OutputOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Extract(ExtractError::MissingFile { year: 2024, .. })
        ));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_invalid_cell_aborts() {
        let raw_dir = tempfile::tempdir().unwrap();
        write_fixture(raw_dir.path());
        write(raw_dir.path(), "sfa_2024.csv", SFA, &["100,forty-five"]);

        let err = load_extracts(raw_dir.path(), &[2024]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Extract(ExtractError::InvalidCell { .. })));
    }

    #[tokio::test]
    async fn test_publish_failure_is_logged() {
        let raw_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_fixture(raw_dir.path());
        let out = out_dir.path().join("not-a-dir");
        fs::write(&out, "occupied").unwrap();

        let mut rx = LOG_BROADCASTER.subscribe();
        let err = run_pipeline(&config(raw_dir.path(), &out), OutputOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Output(_)));
        assert_eq!(fs::read_to_string(&out).unwrap(), "occupied");

        let mut logged = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => {
                    if entry.level == LogLevel::Error && entry.message.contains("not-a-dir") {
                        logged = true;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(logged);
    }
}
