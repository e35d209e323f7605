//! Texas CC CLI - Benchmark Texas community colleges from IPEDS extracts
//!
//! # Main Commands
//!
//! ```bash
//! texas-cc run                      # Load, transform, validate and publish all tables
//! texas-cc run --json               # Also write <table>.json next to each CSV
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! texas-cc filter hd_2024.csv       # Show which institutions qualify and why
//! texas-cc peer-groups              # Print peer-group assignments as JSON
//! texas-cc schema fct_student_outcomes
//! texas-cc config                   # Print the effective configuration
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use texas_cc::config::parse_years;
use texas_cc::models::Institution;
use texas_cc::parser::SurveyRecord;
use texas_cc::transform::filter::is_texas_two_year;
use texas_cc::{
    load_extracts, qualifying_rules, read_extract, run_pipeline, run_transform, schema_source,
    year_from_path, ExtractSource, OutputError, OutputOptions, PipelineConfig, Survey, TableName,
    Year,
};

#[derive(Parser)]
#[command(name = "texas-cc")]
#[command(
    about = "Benchmark Texas public two-year colleges from IPEDS extracts",
    long_about = None
)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Survey years, e.g. "2020,2021,2022" (overrides config and TXCC_YEARS)
    #[arg(long, global = true)]
    years: Option<String>,

    /// Directory holding the raw extracts
    #[arg(long, global = true)]
    extract_dir: Option<PathBuf>,

    /// Directory the tables are published to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: extracts → transform → validated tables
    Run {
        /// Also write JSON copies of every table
        #[arg(long)]
        json: bool,
    },

    /// Apply the institution filter to one HD extract
    Filter {
        /// HD extract, e.g. hd_2024.csv
        input: PathBuf,

        /// Survey year (default: taken from the file name)
        #[arg(long)]
        year: Option<Year>,
    },

    /// Print peer-group assignments without publishing
    PeerGroups,

    /// Print the JSON schema of an output table
    Schema {
        /// Table name, e.g. fct_student_outcomes
        table: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run { json } => match load_config(&cli) {
            Ok(config) => cmd_run(&config, *json).await,
            Err(e) => Err(e),
        },

        Commands::Filter { input, year } => cmd_filter(input, *year),

        Commands::PeerGroups => match load_config(&cli) {
            Ok(config) => cmd_peer_groups(&config).await,
            Err(e) => Err(e),
        },

        Commands::Schema { table } => cmd_schema(table),

        Commands::Config => load_config(&cli).and_then(|config| cmd_config(&config)),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Defaults, then the config file, then `TXCC_*` variables, then flags.
fn load_config(cli: &Cli) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;

    if let Some(ref years) = cli.years {
        config.years = parse_years(years)?;
    }
    if let Some(ref dir) = cli.extract_dir {
        config.extract_dir = dir.clone();
    }
    if let Some(ref dir) = cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

async fn cmd_run(config: &PipelineConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Extracts: {}", config.extract_dir.display());
    eprintln!("   Years: {:?}", config.normalized_years());

    let report = run_pipeline(config, OutputOptions { json }).await?;
    let summary = &report.summary;

    eprintln!("\n📊 Summary:");
    eprintln!("   Roster rows: {}", summary.roster_rows);
    eprintln!("   Institutions: {}", summary.institutions);
    eprintln!(
        "   Cohort scheme overlaps: {} ({} duplicate rows)",
        summary.cohort_scheme_overlaps, summary.duplicate_cohort_rows
    );
    eprintln!("   Enrollment snapshot: {}", format_year(summary.enrollment_snapshot_year));
    eprintln!("   Financial aid snapshot: {}", format_year(summary.financial_aid_snapshot_year));
    eprintln!("   Peer groups: {}", summary.peer_groups);
    eprintln!("   Fact rows: {}", summary.fact_rows);

    for table in &report.published {
        eprintln!("   💾 {} ({} rows)", table.csv_path.display(), table.rows);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("\n✨ Done!");
    Ok(())
}

fn format_year(year: Option<Year>) -> String {
    match year {
        Some(y) => y.to_string(),
        None => "none".to_string(),
    }
}

fn cmd_filter(input: &Path, year: Option<Year>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Filtering: {}", input.display());

    let year = year.or_else(|| year_from_path(input)).ok_or_else(|| {
        format!("Cannot infer a survey year from {}; pass --year", input.display())
    })?;

    let source = ExtractSource::new(Survey::Institutions, input);
    let table = read_extract(&source)?;
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Rows: {}", table.rows.len());

    let roster = Institution::decode(&table, &source, year)?;
    let mut selected = 0;
    for inst in roster.iter().filter(|i| is_texas_two_year(i)) {
        selected += 1;
        let rules: Vec<&str> = qualifying_rules(inst).iter().map(|r| r.description()).collect();
        println!("  {} {}", inst.unitid, inst.name);
        println!("     {}", rules.join("; "));
    }

    eprintln!("\n✅ {} of {} institutions qualify", selected, roster.len());
    Ok(())
}

async fn cmd_peer_groups(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let raw = load_extracts(&config.extract_dir, &config.normalized_years()).await?;
    let transformed = run_transform(&raw, config);

    eprintln!(
        "📦 {} institutions in {} peer groups",
        transformed.tables.peer_groups.len(),
        transformed.summary.peer_groups
    );
    println!("{}", serde_json::to_string_pretty(&transformed.tables.peer_groups)?);
    Ok(())
}

fn cmd_schema(table: &str) -> Result<(), Box<dyn std::error::Error>> {
    let table =
        TableName::parse(table).ok_or_else(|| OutputError::UnknownTable(table.to_string()))?;
    println!("{}", schema_source(table));
    Ok(())
}

fn cmd_config(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
