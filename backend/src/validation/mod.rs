//! JSON Schema validation of output tables.
//!
//! Every published table has a Draft 7 schema embedded at compile time from
//! the `schemas/` directory. Each row is serialised to JSON and checked
//! before anything is written, so a row that drifts from the published
//! column contract aborts the run instead of landing in the output.
//!
//! # Example
//!
//! ```rust,ignore
//! use texas_cc::models::{OutcomeFact, TableName};
//! use texas_cc::validation::validate_rows;
//!
//! let fact = OutcomeFact { unitid: 224615, year: 2024, ..Default::default() };
//! assert!(validate_rows(TableName::FctStudentOutcomes, &[fact]).is_ok());
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::error::{OutputError, OutputResult};
use crate::models::{TableName, Tables};

/// Raw text of the embedded schema for `table`.
pub fn schema_source(table: TableName) -> &'static str {
    match table {
        TableName::DimTexasInstitutions => {
            include_str!("../../schemas/dim_texas_institutions.json")
        }
        TableName::FctStudentOutcomes => include_str!("../../schemas/fct_student_outcomes.json"),
        TableName::IntPeerGroups => include_str!("../../schemas/int_peer_groups.json"),
        TableName::RptPeerComparison => include_str!("../../schemas/rpt_peer_comparison.json"),
        TableName::RptEquityDashboard => include_str!("../../schemas/rpt_equity_dashboard.json"),
    }
}

/// Parsed embedded schema for `table`.
pub fn table_schema(table: TableName) -> Value {
    serde_json::from_str(schema_source(table)).expect("Invalid embedded schema")
}

/// Column names of `table`, in output order.
pub fn table_columns(table: TableName) -> Vec<String> {
    table_schema(table)["required"]
        .as_array()
        .map(|cols| {
            cols.iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Validate every row of one table; the first invalid row is reported.
pub fn validate_rows<T: Serialize>(table: TableName, rows: &[T]) -> OutputResult<()> {
    let schema = table_schema(table);
    let validator = jsonschema::draft7::new(&schema).map_err(|e| OutputError::SchemaViolation {
        table: table.to_string(),
        row: 0,
        errors: vec![format!("Invalid schema: {}", e)],
    })?;

    for (i, row) in rows.iter().enumerate() {
        let value = serde_json::to_value(row)?;
        let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            return Err(OutputError::SchemaViolation {
                table: table.to_string(),
                row: i,
                errors,
            });
        }
    }
    Ok(())
}

/// Validate all five tables.
pub fn validate_tables(tables: &Tables) -> OutputResult<()> {
    validate_rows(TableName::DimTexasInstitutions, &tables.institutions)?;
    validate_rows(TableName::FctStudentOutcomes, &tables.outcomes)?;
    validate_rows(TableName::IntPeerGroups, &tables.peer_groups)?;
    validate_rows(TableName::RptPeerComparison, &tables.peer_comparison)?;
    validate_rows(TableName::RptEquityDashboard, &tables.equity_dashboard)?;
    Ok(())
}
