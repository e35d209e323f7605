//! Pipeline configuration.
//!
//! The only tunable parameters are the survey years to process and the
//! peer-grouping thresholds; directories say where extracts are read from and
//! tables are published to.
//!
//! Layering, lowest to highest precedence:
//! 1. [`PipelineConfig::default`]
//! 2. a JSON file ([`PipelineConfig::from_file`])
//! 3. environment (`TXCC_YEARS`, `TXCC_EXTRACT_DIR`, `TXCC_OUTPUT_DIR`), with `.env`
//!    loaded by the CLI
//! 4. command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::Year;

pub const ENV_YEARS: &str = "TXCC_YEARS";
pub const ENV_EXTRACT_DIR: &str = "TXCC_EXTRACT_DIR";
pub const ENV_OUTPUT_DIR: &str = "TXCC_OUTPUT_DIR";

/// Peer-grouping cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerThresholds {
    /// Total enrollment at or above which an institution is Large.
    pub min_enrollment_large: u32,
    /// Total enrollment at or above which an institution is Medium.
    pub min_enrollment_medium: u32,
    /// Hispanic enrollment share (percent) at or above which an institution is HSI.
    pub hsi_threshold_pct: f64,
    /// Pell-recipient share (percent) at or above which an institution is High Pell.
    pub high_pell_threshold_pct: f64,
}

impl Default for PeerThresholds {
    fn default() -> Self {
        Self {
            min_enrollment_large: 15_000,
            min_enrollment_medium: 5_000,
            hsi_threshold_pct: 25.0,
            high_pell_threshold_pct: 40.0,
        }
    }
}

/// Options for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Survey years to process
    pub years: Vec<Year>,

    /// Directory holding `<survey>_<year>.csv` extracts
    pub extract_dir: PathBuf,

    /// Directory the output tables are published to
    pub output_dir: PathBuf,

    pub thresholds: PeerThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            years: (2020..=2024).collect(),
            extract_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/marts"),
            thresholds: PeerThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; absent keys keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `TXCC_*` environment overrides.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(
            std::env::var(ENV_YEARS).ok().as_deref(),
            std::env::var(ENV_EXTRACT_DIR).ok().as_deref(),
            std::env::var(ENV_OUTPUT_DIR).ok().as_deref(),
        )
    }

    fn apply_overrides(
        &mut self,
        years: Option<&str>,
        extract_dir: Option<&str>,
        output_dir: Option<&str>,
    ) -> ConfigResult<()> {
        if let Some(years) = years {
            self.years = parse_years(years)?;
        }
        if let Some(dir) = extract_dir {
            self.extract_dir = PathBuf::from(dir);
        }
        if let Some(dir) = output_dir {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.years.is_empty() {
            return Err(invalid("years", "at least one survey year is required"));
        }
        let t = &self.thresholds;
        if t.min_enrollment_medium == 0 || t.min_enrollment_medium >= t.min_enrollment_large {
            return Err(invalid(
                "thresholds.min_enrollment_medium",
                format!(
                    "must be positive and below min_enrollment_large ({})",
                    t.min_enrollment_large
                ),
            ));
        }
        for (field, pct) in [
            ("thresholds.hsi_threshold_pct", t.hsi_threshold_pct),
            ("thresholds.high_pell_threshold_pct", t.high_pell_threshold_pct),
        ] {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(invalid(field, format!("{} is not a percentage in (0, 100]", pct)));
            }
        }
        Ok(())
    }

    /// Years sorted and deduplicated.
    pub fn normalized_years(&self) -> Vec<Year> {
        let mut years = self.years.clone();
        years.sort_unstable();
        years.dedup();
        years
    }
}

/// Parse a comma- or space-separated year list, e.g. `2020,2021 2022`.
pub fn parse_years(raw: &str) -> ConfigResult<Vec<Year>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Year>()
                .map_err(|_| invalid("years", format!("'{}' is not a year", s)))
        })
        .collect()
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.thresholds.min_enrollment_large, 15000);
        assert_eq!(config.thresholds.min_enrollment_medium, 5000);
        assert_eq!(config.thresholds.hsi_threshold_pct, 25.0);
        assert_eq!(config.thresholds.high_pell_threshold_pct, 40.0);
        assert_eq!(config.years, vec![2020, 2021, 2022, 2023, 2024]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"years": [2023], "thresholds": {{"hsi_threshold_pct": 30}}}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.years, vec![2023]);
        assert_eq!(config.thresholds.hsi_threshold_pct, 30.0);
        assert_eq!(config.thresholds.min_enrollment_large, 15000);
        assert_eq!(config.extract_dir, PathBuf::from("data/raw"));
    }

    #[test]
    fn test_overrides() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(Some("2022, 2021"), Some("/tmp/raw"), None)
            .unwrap();
        assert_eq!(config.years, vec![2022, 2021]);
        assert_eq!(config.normalized_years(), vec![2021, 2022]);
        assert_eq!(config.extract_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.output_dir, PathBuf::from("data/marts"));
    }

    #[test]
    fn test_bad_year_rejected() {
        let err = parse_years("2022,twenty").unwrap_err();
        assert!(err.to_string().contains("twenty"));
    }

    #[test]
    fn test_validate_rejects_inverted_size_cutoffs() {
        let mut config = PipelineConfig::default();
        config.thresholds.min_enrollment_medium = 20_000;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.years.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.thresholds.high_pell_threshold_pct = 140.0;
        assert!(config.validate().is_err());
    }
}
