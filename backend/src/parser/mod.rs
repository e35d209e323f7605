//! IPEDS extract reader with encoding and delimiter auto-detection.
//!
//! Older IPEDS zips ship Latin-1 CSVs, newer ones UTF-8 with a BOM, so bytes
//! are decoded before the CSV layer sees them and header names are normalised
//! (BOM stripped, trimmed, upper-cased). Typed decoding per survey lives in
//! [`surveys`].

use csv::StringRecord;
use std::path::{Path, PathBuf};

use crate::error::{CsvError, ExtractError, ExtractResult};
use crate::models::{Survey, Year};

pub mod surveys;

pub use surveys::{load_survey, SurveyRecord};

/// Where a table came from, carried into every error.
#[derive(Debug, Clone)]
pub struct ExtractSource {
    pub survey: Survey,
    pub path: PathBuf,
}

impl ExtractSource {
    pub fn new(survey: Survey, path: impl Into<PathBuf>) -> Self {
        Self {
            survey,
            path: path.into(),
        }
    }

    /// Conventional location of a (survey, year) extract under `dir`.
    pub fn locate(dir: &Path, survey: Survey, year: Year) -> Self {
        Self::new(survey, dir.join(survey.file_name(year)))
    }

    pub(crate) fn invalid_cell(&self, source: CsvError) -> ExtractError {
        ExtractError::InvalidCell {
            survey: self.survey,
            path: self.path.clone(),
            source,
        }
    }

    pub(crate) fn missing_column(&self, column: &str) -> ExtractError {
        ExtractError::MissingColumn {
            survey: self.survey,
            path: self.path.clone(),
            column: column.to_string(),
        }
    }
}

/// A decoded extract: normalised headers and raw string records.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// A resolved header position.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub index: usize,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = clean_column_name(name);
        self.headers.iter().position(|h| *h == wanted)
    }

    /// Resolve a required column; its absence is an upstream schema violation.
    pub fn require(&self, source: &ExtractSource, name: &str) -> ExtractResult<Column> {
        self.column_index(name)
            .map(|index| Column {
                name: name.to_string(),
                index,
            })
            .ok_or_else(|| source.missing_column(name))
    }

    /// Resolve the first present of several versioned names for one column.
    pub fn require_any(&self, source: &ExtractSource, names: &[&str]) -> ExtractResult<Column> {
        names
            .iter()
            .find_map(|name| {
                self.column_index(name).map(|index| Column {
                    name: name.to_string(),
                    index,
                })
            })
            .ok_or_else(|| source.missing_column(&names.join(" | ")))
    }

    /// Data rows with their 1-based line numbers (header is line 1).
    pub fn cells(&self) -> impl Iterator<Item = Cells<'_>> {
        self.rows.iter().enumerate().map(|(i, record)| Cells {
            record,
            line: i + 2,
        })
    }
}

/// Typed access to the cells of one record.
pub struct Cells<'a> {
    record: &'a StringRecord,
    pub line: usize,
}

impl<'a> Cells<'a> {
    /// Raw text, `None` for IPEDS nulls (empty or `.`).
    pub fn text(&self, column: &Column) -> Option<&'a str> {
        let raw = self.record.get(column.index)?.trim();
        if raw.is_empty() || raw == "." {
            None
        } else {
            Some(raw)
        }
    }

    pub fn string(&self, column: &Column) -> Option<String> {
        self.text(column).map(String::from)
    }

    pub fn required_string(&self, column: &Column) -> Result<String, CsvError> {
        self.string(column).ok_or_else(|| {
            CsvError::new(self.line, "required value is empty").with_column(&column.name)
        })
    }

    pub fn opt_u32(&self, column: &Column) -> Result<Option<u32>, CsvError> {
        self.parse_integer(column).and_then(|v| match v {
            None => Ok(None),
            Some(n) if (0..=u32::MAX as i64).contains(&n) => Ok(Some(n as u32)),
            Some(_) => Err(self.invalid(column, "expected a non-negative count")),
        })
    }

    pub fn required_u32(&self, column: &Column) -> Result<u32, CsvError> {
        self.opt_u32(column)?.ok_or_else(|| {
            CsvError::new(self.line, "required value is empty").with_column(&column.name)
        })
    }

    /// Integer code; IPEDS uses negatives such as `-2` for "not applicable".
    pub fn opt_i32(&self, column: &Column) -> Result<Option<i32>, CsvError> {
        self.parse_integer(column).and_then(|v| match v {
            None => Ok(None),
            Some(n) if (i32::MIN as i64..=i32::MAX as i64).contains(&n) => Ok(Some(n as i32)),
            Some(_) => Err(self.invalid(column, "integer out of range")),
        })
    }

    pub fn required_i32(&self, column: &Column) -> Result<i32, CsvError> {
        self.opt_i32(column)?.ok_or_else(|| {
            CsvError::new(self.line, "required value is empty").with_column(&column.name)
        })
    }

    pub fn opt_f64(&self, column: &Column) -> Result<Option<f64>, CsvError> {
        match self.text(column) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| self.invalid(column, "expected a number")),
        }
    }

    /// Accepts `12` and `12.0`, rejects `12.5`.
    fn parse_integer(&self, column: &Column) -> Result<Option<i64>, CsvError> {
        let Some(raw) = self.text(column) else {
            return Ok(None);
        };
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Some(n));
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(Some(v as i64)),
            _ => Err(self.invalid(column, "expected an integer")),
        }
    }

    fn invalid(&self, column: &Column, message: &str) -> CsvError {
        let err = CsvError::new(self.line, message).with_column(&column.name);
        match self.record.get(column.index) {
            Some(value) => err.with_value(value),
            None => err,
        }
    }
}

/// Normalise a header name: strip BOMs and whitespace, upper-case.
pub fn clean_column_name(col: &str) -> String {
    let mut cleaned = col.trim();
    if let Some(rest) = cleaned.strip_prefix('\u{feff}') {
        cleaned = rest;
    }
    // UTF-8 BOM that was decoded as Latin-1
    if let Some(rest) = cleaned.strip_prefix("ï»¿") {
        cleaned = rest;
    }
    cleaned.trim().trim_matches('"').to_uppercase()
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the specified encoding.
///
/// Invalid UTF-8 falls back to Windows-1252, which is what IPEDS uses for
/// pre-2023 files whatever the detector guessed.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse extract bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], source: &ExtractSource) -> ExtractResult<RawTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_str(&content, delimiter, encoding, source)
}

/// Parse decoded CSV text with an explicit delimiter.
pub fn parse_str(
    content: &str,
    delimiter: char,
    encoding: String,
    source: &ExtractSource,
) -> ExtractResult<RawTable> {
    let csv_err = |e: csv::Error| ExtractError::Csv {
        survey: source.survey,
        path: source.path.clone(),
        source: e,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(clean_column_name)
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ExtractError::Empty {
            survey: source.survey,
            path: source.path.clone(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }

    Ok(RawTable {
        headers,
        rows,
        encoding,
        delimiter,
    })
}

/// Read and parse one extract file.
pub fn read_extract(source: &ExtractSource) -> ExtractResult<RawTable> {
    let bytes = std::fs::read(&source.path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::MissingFile {
                survey: source.survey,
                year: year_from_path(&source.path).unwrap_or_default(),
                path: source.path.clone(),
            }
        } else {
            ExtractError::Io {
                path: source.path.clone(),
                source: e,
            }
        }
    })?;
    parse_bytes_auto(&bytes, source)
}

/// Year suffix of a `<survey>_<year>.csv` file name.
pub fn year_from_path(path: &Path) -> Option<Year> {
    path.file_stem()?
        .to_str()?
        .rsplit('_')
        .next()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ExtractSource {
        ExtractSource::new(Survey::Institutions, "hd_2023.csv")
    }

    fn parse(csv: &str) -> RawTable {
        parse_bytes_auto(csv.as_bytes(), &source()).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let table = parse("UNITID,INSTNM\n100,Alpha College\n200,Beta College");
        assert_eq!(table.headers, vec!["UNITID", "INSTNM"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.delimiter, ',');
        assert_eq!(&table.rows[1][1], "Beta College");
    }

    #[test]
    fn test_quoted_values_with_commas() {
        let table = parse("UNITID,INSTNM\n100,\"Alamo Colleges, San Antonio\"");
        assert_eq!(&table.rows[0][1], "Alamo Colleges, San Antonio");
    }

    #[test]
    fn test_headers_normalized() {
        let table = parse("\u{feff}unitid , instnm\n1,A");
        assert_eq!(table.headers, vec!["UNITID", "INSTNM"]);
        assert_eq!(clean_column_name("ï»¿UnitID"), "UNITID");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse("A,B\n1,2\n,\n3,4\n");
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_require_missing_column() {
        let table = parse("UNITID,INSTNM\n1,A");
        let err = table.require(&source(), "STABBR").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingColumn { ref column, .. } if column == "STABBR"
        ));
    }

    #[test]
    fn test_require_any_versioned_column() {
        let table = parse("UNITID,C18BASIC\n1,2");
        let col = table.require_any(&source(), &["C21BASIC", "C18BASIC"]).unwrap();
        assert_eq!(col.name, "C18BASIC");
        assert_eq!(col.index, 1);
    }

    #[test]
    fn test_cell_nulls_and_numbers() {
        let table = parse("A,B,C,D\n.,12.0,-2,abc");
        let cols: Vec<Column> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| table.require(&source(), n).unwrap())
            .collect();
        let cells = table.cells().next().unwrap();

        assert_eq!(cells.opt_u32(&cols[0]).unwrap(), None);
        assert_eq!(cells.opt_u32(&cols[1]).unwrap(), Some(12));
        assert_eq!(cells.opt_i32(&cols[2]).unwrap(), Some(-2));
        assert!(cells.opt_u32(&cols[2]).is_err());

        let err = cells.opt_f64(&cols[3]).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.value.as_deref(), Some("abc"));
    }

    #[test]
    fn test_fractional_count_rejected() {
        let table = parse("A\n12.5");
        let col = table.require(&source(), "A").unwrap();
        let cells = table.cells().next().unwrap();
        assert!(cells.opt_u32(&col).is_err());
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Cañada" in ISO-8859-1
        let bytes: &[u8] = &[0x43, 0x61, 0xF1, 0x61, 0x64, 0x61];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Cañada");
        // Invalid UTF-8 claimed as UTF-8 still decodes
        assert_eq!(decode_content(bytes, "utf-8"), "Cañada");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = ExtractSource::locate(dir.path(), Survey::Graduation, 2022);
        let err = read_extract(&source).unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile { year: 2022, .. }));
    }

    #[test]
    fn test_year_from_path() {
        assert_eq!(year_from_path(Path::new("data/ef_d_2021.csv")), Some(2021));
        assert_eq!(year_from_path(Path::new("data/hd.csv")), None);
    }
}
