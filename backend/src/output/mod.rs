//! Table writer.
//!
//! Tables are rendered to memory first, then written under temporary names
//! and renamed into place once every file has been written. Replaced files
//! are kept as backups until every rename succeeded and are restored if one
//! fails, so a failed run leaves the previous outputs untouched.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{OutputError, OutputResult};
use crate::logs::{log_info_indent, log_success};
use crate::models::{TableName, Tables};
use crate::validation::table_columns;

/// Output formats besides CSV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Also write `<table>.json`.
    pub json: bool,
}

/// A table that was published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedTable {
    pub table: TableName,
    pub rows: usize,
    pub csv_path: PathBuf,
    pub json_path: Option<PathBuf>,
}

/// CSV bytes for `rows`, header first.
///
/// An empty table still gets its header line.
pub fn render_csv<T: Serialize>(table: TableName, rows: &[T]) -> OutputResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!rows.is_empty())
        .from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(table_columns(table))?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| OutputError::Io(e.into_error()))
}

/// Pretty-printed JSON array of `rows`.
pub fn render_json<T: Serialize>(rows: &[T]) -> OutputResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(rows)?;
    bytes.push(b'\n');
    Ok(bytes)
}

struct RenderedFile {
    path: PathBuf,
    bytes: Vec<u8>,
}

fn render_table<T: Serialize>(
    dir: &Path,
    table: TableName,
    rows: &[T],
    options: OutputOptions,
    files: &mut Vec<RenderedFile>,
) -> OutputResult<PublishedTable> {
    let csv_path = dir.join(format!("{}.csv", table));
    files.push(RenderedFile {
        path: csv_path.clone(),
        bytes: render_csv(table, rows)?,
    });

    let json_path = if options.json {
        let path = dir.join(format!("{}.json", table));
        files.push(RenderedFile {
            path: path.clone(),
            bytes: render_json(rows)?,
        });
        Some(path)
    } else {
        None
    };

    Ok(PublishedTable {
        table,
        rows: rows.len(),
        csv_path,
        json_path,
    })
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}", name, suffix))
}

fn temp_path(path: &Path) -> PathBuf {
    sibling_path(path, "tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, "bak")
}

/// Write every table to `dir`, all or nothing.
pub fn publish_tables(
    tables: &Tables,
    dir: &Path,
    options: OutputOptions,
) -> OutputResult<Vec<PublishedTable>> {
    let mut files = Vec::new();
    let published = vec![
        render_table(
            dir,
            TableName::DimTexasInstitutions,
            &tables.institutions,
            options,
            &mut files,
        )?,
        render_table(dir, TableName::FctStudentOutcomes, &tables.outcomes, options, &mut files)?,
        render_table(dir, TableName::IntPeerGroups, &tables.peer_groups, options, &mut files)?,
        render_table(
            dir,
            TableName::RptPeerComparison,
            &tables.peer_comparison,
            options,
            &mut files,
        )?,
        render_table(
            dir,
            TableName::RptEquityDashboard,
            &tables.equity_dashboard,
            options,
            &mut files,
        )?,
    ];

    fs::create_dir_all(dir)?;
    for file in &files {
        if file.path.exists() && !file.path.is_file() {
            return Err(OutputError::NotAFile(file.path.clone()));
        }
    }

    let mut staged = Vec::with_capacity(files.len());
    for file in &files {
        let tmp = temp_path(&file.path);
        if let Err(e) = fs::write(&tmp, &file.bytes) {
            discard(&staged);
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        staged.push(tmp);
    }

    let targets: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    commit(&staged, &targets)?;

    for table in &published {
        log_info_indent(format!("{}: {} rows", table.table, table.rows), 1);
    }
    log_success(format!("Published {} tables to {}", published.len(), dir.display()));
    Ok(published)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        let _ = fs::remove_file(path);
    }
}

/// Rename every staged file onto its target.
///
/// On the first failure, targets already replaced are put back from their
/// backups (or removed when they did not exist before) and every staged file
/// is deleted.
fn commit(staged: &[PathBuf], targets: &[PathBuf]) -> OutputResult<()> {
    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut replaced: Vec<&Path> = Vec::new();

    for (tmp, target) in staged.iter().zip(targets) {
        if let Err(e) = swap_in(tmp, target, &mut backups) {
            roll_back(&replaced, &backups);
            discard(staged);
            return Err(e.into());
        }
        replaced.push(target.as_path());
    }

    for (_, backup) in &backups {
        let _ = fs::remove_file(backup);
    }
    Ok(())
}

fn swap_in(
    tmp: &Path,
    target: &Path,
    backups: &mut Vec<(PathBuf, PathBuf)>,
) -> std::io::Result<()> {
    if target.is_file() {
        let backup = backup_path(target);
        fs::rename(target, &backup)?;
        backups.push((target.to_path_buf(), backup));
    }
    fs::rename(tmp, target)
}

fn roll_back(replaced: &[&Path], backups: &[(PathBuf, PathBuf)]) {
    for target in replaced {
        let _ = fs::remove_file(target);
    }
    for (target, backup) in backups {
        let _ = fs::rename(backup, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeFact;

    fn fact(unitid: u32, grad: Option<f64>) -> OutcomeFact {
        OutcomeFact {
            unitid,
            year: 2024,
            graduation_rate_150: grad,
            ..Default::default()
        }
    }

    #[test]
    fn test_render_csv_nulls_are_empty() {
        let rows = [fact(1, Some(45.0)), fact(2, None)];
        let bytes = render_csv(TableName::FctStudentOutcomes, &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());

        let headers = reader.headers().unwrap().clone();
        let idx = headers.iter().position(|h| h == "graduation_rate_150").unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][idx], "45.0");
        assert_eq!(&rows[1][idx], "");
    }

    #[test]
    fn test_empty_table_has_header() {
        let rows: Vec<OutcomeFact> = Vec::new();
        let bytes = render_csv(TableName::FctStudentOutcomes, &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("unitid,year,institution_name,"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_publish_writes_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("marts");
        let tables = Tables {
            outcomes: vec![fact(1, Some(45.0))],
            ..Default::default()
        };

        let published = publish_tables(&tables, &out, OutputOptions { json: true }).unwrap();
        assert_eq!(published.len(), 5);
        for table in &published {
            assert!(table.csv_path.exists());
            assert!(table.json_path.as_ref().unwrap().exists());
        }

        let bytes = fs::read(out.join("fct_student_outcomes.json")).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json[0]["graduation_rate_150"], 45.0);

        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_blocked_target_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dim_texas_institutions.csv"), "old dimension\n").unwrap();
        fs::create_dir_all(dir.path().join("fct_student_outcomes.csv").join("blocker")).unwrap();

        let err = publish_tables(&Tables::default(), dir.path(), OutputOptions::default())
            .unwrap_err();
        assert!(matches!(err, OutputError::NotAFile(_)));

        assert_eq!(
            fs::read_to_string(dir.path().join("dim_texas_institutions.csv")).unwrap(),
            "old dimension\n"
        );
        assert!(dir.path().join("fct_student_outcomes.csv").join("blocker").is_dir());
        assert_eq!(
            file_names(dir.path()),
            vec!["dim_texas_institutions.csv", "fct_student_outcomes.csv"]
        );
    }

    #[test]
    fn test_failed_rename_restores_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("dim_texas_institutions.csv");
        let second = dir.path().join("fct_student_outcomes.csv");
        let third = dir.path().join("int_peer_groups.csv");
        fs::write(&first, "old first").unwrap();
        fs::write(&second, "old second").unwrap();

        let staged = vec![temp_path(&first), temp_path(&second), temp_path(&third)];
        fs::write(&staged[0], "new first").unwrap();
        fs::write(&staged[1], "new second").unwrap();
        // third staged file is missing, so its rename fails after two succeeded

        let err = commit(&staged, &[first.clone(), second.clone(), third.clone()]).unwrap_err();
        assert!(matches!(err, OutputError::Io(_)));

        assert_eq!(fs::read_to_string(&first).unwrap(), "old first");
        assert_eq!(fs::read_to_string(&second).unwrap(), "old second");
        assert!(!third.exists());
        assert_eq!(
            file_names(dir.path()),
            vec!["dim_texas_institutions.csv", "fct_student_outcomes.csv"]
        );
    }

    #[test]
    fn test_republish_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let tables = Tables {
            outcomes: vec![fact(1, Some(45.0)), fact(2, Some(33.3))],
            ..Default::default()
        };
        publish_tables(&tables, dir.path(), OutputOptions::default()).unwrap();
        let first = fs::read(dir.path().join("fct_student_outcomes.csv")).unwrap();
        publish_tables(&tables, dir.path(), OutputOptions::default()).unwrap();
        let second = fs::read(dir.path().join("fct_student_outcomes.csv")).unwrap();
        assert_eq!(first, second);
        assert!(!dir.path().join("fct_student_outcomes.json").exists());
    }
}
