//! # Texas CC - Community college benchmarking from IPEDS extracts
//!
//! Turns raw IPEDS survey extracts (institutions, completions, enrollment,
//! graduation, financial aid, retention) into analytics tables for Texas
//! public two-year institutions: an institution dimension, an outcomes fact,
//! peer groups, a peer comparison report and an equity dashboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ IPEDS CSVs  │────▶│   Parser    │────▶│  Transform  │────▶│ CSV / JSON  │
//! │ (6 surveys) │     │  (auto-enc) │     │ (peers+KPI) │     │ (validated) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use texas_cc::{run_pipeline, OutputOptions, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PipelineConfig::default();
//!     let report = run_pipeline(&config, OutputOptions::default()).await.unwrap();
//!     println!("Published {} fact rows", report.summary.fact_rows);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Survey rows, classifications and output tables
//! - [`logs`] - Broadcast pipeline log
//! - [`config`] - Layered run configuration
//! - [`parser`] - Extract reading with auto-detection
//! - [`transform`] - Filtering, reconciliation, peer groups and reports
//! - [`validation`] - Output table schema validation
//! - [`output`] - Atomic table publishing

// Core modules
pub mod error;
pub mod models;
pub mod logs;
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Output
pub mod output;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    ExtractError,
    OutputError,
    PipelineError,
    PipelineResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DemographicGroup,
    Demographics,
    GapSeverity,
    PeerTier,
    PellTier,
    SizeTier,
    Survey,
    TableName,
    Tables,
    UnitId,
    Urbanicity,
    Year,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{PeerThresholds, PipelineConfig};

// =============================================================================
// Re-exports - Extract Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    load_survey,
    read_extract,
    year_from_path,
    ExtractSource,
    RawTable,
};

// =============================================================================
// Re-exports - Transform stages
// =============================================================================

pub use transform::{
    aggregate_completions,
    aggregate_retention,
    assign_peer_groups,
    qualifying_rules,
    reconcile_cohorts,
    select_institutions,
    InclusionRule,
    InstitutionSet,
    PeerGroup,
    PeerGroups,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    load_extracts,
    run_pipeline,
    run_transform,
    RawExtracts,
    RunReport,
    RunSummary,
    Transformed,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{schema_source, table_columns, validate_rows, validate_tables};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use output::{publish_tables, OutputOptions, PublishedTable};
