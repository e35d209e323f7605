//! Typed decoding of each IPEDS survey.
//!
//! Each survey resolves its full column set against the header before reading a
//! single row, so a renamed or missing column aborts the load instead of
//! producing nulls.

use std::path::Path;

use super::{read_extract, Cells, Column, ExtractSource, RawTable};
use crate::error::{CsvError, ExtractResult};
use crate::models::{
    CohortRow, CompletionRow, DemographicGroup, Demographics, EnrollmentRow, FinancialAidRow,
    Institution, RetentionRow, Survey, Year,
};

/// Carnegie basic classification, newest edition first.
pub const CARNEGIE_COLUMNS: [&str; 3] = ["C21BASIC", "C18BASIC", "C15BASIC"];

/// A row type decodable from one survey's extract.
pub trait SurveyRecord: Sized + Send + 'static {
    const SURVEY: Survey;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>>;
}

/// Load every configured year of one survey from `dir`.
///
/// Rows keep file order within a year and years are read in ascending order,
/// which later stages rely on for "first row wins" tie-breaking.
pub fn load_survey<T: SurveyRecord>(dir: &Path, years: &[Year]) -> ExtractResult<Vec<T>> {
    let mut years = years.to_vec();
    years.sort_unstable();
    years.dedup();

    let mut rows = Vec::new();
    for year in years {
        let source = ExtractSource::locate(dir, T::SURVEY, year);
        let table = read_extract(&source)?;
        rows.extend(T::decode(&table, &source, year)?);
    }
    Ok(rows)
}

/// Decode every row with `f`, attaching the extract to cell errors.
fn decode_rows<T>(
    table: &RawTable,
    source: &ExtractSource,
    f: impl Fn(&Cells<'_>) -> Result<T, CsvError>,
) -> ExtractResult<Vec<T>> {
    table
        .cells()
        .map(|cells| f(&cells).map_err(|e| source.invalid_cell(e)))
        .collect()
}

/// The eleven breakdown columns of one survey.
struct DemographicColumns {
    columns: Vec<(DemographicGroup, Column)>,
}

impl DemographicColumns {
    fn resolve(
        table: &RawTable,
        source: &ExtractSource,
        prefix: &str,
        total_stem: &str,
    ) -> ExtractResult<Self> {
        let columns = DemographicGroup::ALL
            .iter()
            .map(|g| {
                table
                    .require(source, &g.column(prefix, total_stem))
                    .map(|c| (*g, c))
            })
            .collect::<ExtractResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    fn read(&self, cells: &Cells<'_>) -> Result<Demographics, CsvError> {
        let mut d = Demographics::default();
        for (group, column) in &self.columns {
            d.set(*group, cells.opt_u32(column)?);
        }
        Ok(d)
    }
}

impl SurveyRecord for Institution {
    const SURVEY: Survey = Survey::Institutions;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let name = table.require(source, "INSTNM")?;
        let city = table.require(source, "CITY")?;
        let state = table.require(source, "STABBR")?;
        let sector = table.require(source, "SECTOR")?;
        let control = table.require(source, "CONTROL")?;
        let level = table.require(source, "ICLEVEL")?;
        let carnegie = table.require_any(source, &CARNEGIE_COLUMNS)?;
        let degree = table.require(source, "HDEGOFR1")?;
        let locale = table.require(source, "LOCALE")?;
        let size = table.require(source, "INSTSIZE")?;
        let lat = table.require(source, "LATITUDE")?;
        let lon = table.require(source, "LONGITUD")?;
        let web = table.require(source, "WEBADDR")?;
        let active = table.require(source, "CYACTIVE")?;

        decode_rows(table, source, |c| {
            Ok(Institution {
                unitid: c.required_u32(&unitid)?,
                year,
                name: c.required_string(&name)?,
                city: c.string(&city),
                state: c.required_string(&state)?,
                sector: c.opt_i32(&sector)?,
                control: c.opt_i32(&control)?,
                level: c.opt_i32(&level)?,
                carnegie_basic: c.opt_i32(&carnegie)?,
                highest_degree: c.opt_i32(&degree)?,
                locale: c.opt_i32(&locale)?,
                size_category: c.opt_i32(&size)?,
                latitude: c.opt_f64(&lat)?,
                longitude: c.opt_f64(&lon)?,
                website: c.string(&web),
                active_code: c.opt_i32(&active)?,
            })
        })
    }
}

impl SurveyRecord for CohortRow {
    const SURVEY: Survey = Survey::Graduation;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let grtype = table.require(source, "GRTYPE")?;
        let total = table.require(source, "GRTOTLT")?;
        let demographics = DemographicColumns::resolve(table, source, "GR", "TOTL")?;

        decode_rows(table, source, |c| {
            Ok(CohortRow {
                unitid: c.required_u32(&unitid)?,
                year,
                cohort_type: c.required_i32(&grtype)?,
                total: c.opt_u32(&total)?,
                demographics: demographics.read(c)?,
            })
        })
    }
}

impl SurveyRecord for CompletionRow {
    const SURVEY: Survey = Survey::Completions;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let cip = table.require(source, "CIPCODE")?;
        let major = table.require(source, "MAJORNUM")?;
        let award = table.require(source, "AWLEVEL")?;
        let total = table.require(source, "CTOTALT")?;
        let demographics = DemographicColumns::resolve(table, source, "C", "TOTAL")?;

        decode_rows(table, source, |c| {
            Ok(CompletionRow {
                unitid: c.required_u32(&unitid)?,
                year,
                cip_code: c.required_string(&cip)?,
                major_number: c.required_i32(&major)?,
                award_level: c.required_i32(&award)?,
                total: c.opt_u32(&total)?,
                demographics: demographics.read(c)?,
            })
        })
    }
}

impl SurveyRecord for EnrollmentRow {
    const SURVEY: Survey = Survey::Enrollment;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let level = table.require(source, "EFFYLEV")?;
        let total = table.require(source, "EFYTOTLT")?;
        let demographics = DemographicColumns::resolve(table, source, "EFY", "TOTL")?;

        decode_rows(table, source, |c| {
            Ok(EnrollmentRow {
                unitid: c.required_u32(&unitid)?,
                year,
                student_level: c.required_i32(&level)?,
                total: c.opt_u32(&total)?,
                demographics: demographics.read(c)?,
            })
        })
    }
}

impl SurveyRecord for FinancialAidRow {
    const SURVEY: Survey = Survey::FinancialAid;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let pell = table.require(source, "PGRNT_P")?;

        decode_rows(table, source, |c| {
            Ok(FinancialAidRow {
                unitid: c.required_u32(&unitid)?,
                year,
                pell_pct: c.opt_f64(&pell)?,
            })
        })
    }
}

impl SurveyRecord for RetentionRow {
    const SURVEY: Survey = Survey::Retention;

    fn decode(table: &RawTable, source: &ExtractSource, year: Year) -> ExtractResult<Vec<Self>> {
        let unitid = table.require(source, "UNITID")?;
        let ft_rate = table.require(source, "RET_PCF")?;
        let pt_rate = table.require(source, "RET_PCP")?;
        let ft_cohort = table.require(source, "RRFTCTA")?;
        let ft_retained = table.require(source, "RET_NMF")?;
        let pt_cohort = table.require(source, "RRPTCTA")?;
        let pt_retained = table.require(source, "RET_NMP")?;
        let ratio = table.require(source, "STUFACR")?;

        decode_rows(table, source, |c| {
            Ok(RetentionRow {
                unitid: c.required_u32(&unitid)?,
                year,
                full_time_rate: c.opt_f64(&ft_rate)?,
                part_time_rate: c.opt_f64(&pt_rate)?,
                full_time_cohort: c.opt_u32(&ft_cohort)?,
                full_time_retained: c.opt_u32(&ft_retained)?,
                part_time_cohort: c.opt_u32(&pt_cohort)?,
                part_time_retained: c.opt_u32(&pt_retained)?,
                student_faculty_ratio: c.opt_f64(&ratio)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::parser::parse_bytes_auto;

    const GR_HEADER: &str = "UNITID,GRTYPE,GRTOTLT,GRTOTLM,GRTOTLW,GRAIANT,GRASIAT,GRBKAAT,GRHISPT,GRNHPIT,GRWHITT,GR2MORT,GRUNKNT,GRNRALT";

    fn decode<T: SurveyRecord>(csv: &str) -> ExtractResult<Vec<T>> {
        let source = ExtractSource::new(T::SURVEY, "test.csv");
        let table = parse_bytes_auto(csv.as_bytes(), &source)?;
        T::decode(&table, &source, 2023)
    }

    #[test]
    fn test_decode_cohort_rows() {
        let csv = format!(
            "{}\n100,29,120,50,70,1,2,10,60,0,40,3,2,2\n100,30,54,,,,,,30,,20,,,",
            GR_HEADER
        );
        let rows: Vec<CohortRow> = decode(&csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cohort_type, 29);
        assert_eq!(rows[0].total, Some(120));
        assert_eq!(rows[0].demographics.hispanic, Some(60));
        assert_eq!(rows[0].year, 2023);
        assert_eq!(rows[1].demographics.men, None);
        assert_eq!(rows[1].demographics.white, Some(20));
    }

    #[test]
    fn test_missing_demographic_column_is_fatal() {
        let header = GR_HEADER.replace(",GRHISPT", "");
        let csv = format!("{}\n100,29,120,50,70,1,2,10,0,40,3,2,2", header);
        let err = decode::<CohortRow>(&csv).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingColumn { ref column, .. } if column == "GRHISPT"
        ));
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let csv = "UNITID,PGRNT_P\n100,forty";
        let err = decode::<FinancialAidRow>(csv).unwrap_err();
        match err {
            ExtractError::InvalidCell { source, .. } => {
                assert_eq!(source.line, 2);
                assert_eq!(source.column.as_deref(), Some("PGRNT_P"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_decode_institution_with_older_carnegie_column() {
        let csv = "UNITID,INSTNM,CITY,STABBR,SECTOR,CONTROL,ICLEVEL,C18BASIC,HDEGOFR1,LOCALE,INSTSIZE,LATITUDE,LONGITUD,WEBADDR,CYACTIVE\n\
                   224615,Del Mar College,Corpus Christi,TX,4,1,2,2,40,12,3,27.77,-97.40,www.delmar.edu,1";
        let rows: Vec<Institution> = decode(csv).unwrap();

        assert_eq!(rows[0].unitid, 224615);
        assert_eq!(rows[0].carnegie_basic, Some(2));
        assert_eq!(rows[0].locale, Some(12));
        assert!(rows[0].is_active());
        assert!(rows[0].is_public());
    }

    #[test]
    fn test_decode_retention() {
        let csv = "UNITID,RET_PCF,RET_PCP,RRFTCTA,RET_NMF,RRPTCTA,RET_NMP,STUFACR\n100,61,44,500,305,300,132,21";
        let rows: Vec<RetentionRow> = decode(csv).unwrap();
        assert_eq!(rows[0].full_time_rate, Some(61.0));
        assert_eq!(rows[0].part_time_retained, Some(132));
        assert_eq!(rows[0].student_faculty_ratio, Some(21.0));
    }

    #[test]
    fn test_load_survey_reads_every_year() {
        let dir = tempfile::tempdir().unwrap();
        for year in [2021, 2022] {
            std::fs::write(
                dir.path().join(format!("sfa_{}.csv", year)),
                "UNITID,PGRNT_P\n100,41\n200,\n",
            )
            .unwrap();
        }

        let rows: Vec<FinancialAidRow> = load_survey(dir.path(), &[2022, 2021]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].year, 2021);
        assert_eq!(rows[3].year, 2022);
        assert_eq!(rows[1].pell_pct, None);

        let err = load_survey::<FinancialAidRow>(dir.path(), &[2023]).unwrap_err();
        assert!(matches!(err, ExtractError::MissingFile { .. }));
    }
}
