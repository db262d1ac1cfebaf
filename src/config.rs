use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::data::filter::FilterRanges;

/// Analysis settings read from a JSON file. Missing fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub filters: FilterRanges,
    /// Report forward and reverse sweeps as separate distributions.
    pub split_directions: bool,
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading analysis config {}", path_ref.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing analysis config {}", path_ref.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Parameter;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_bound_efficiency_and_fill_factor() {
        let cfg = AnalysisConfig::default();
        assert!(!cfg.split_directions);
        assert!(cfg.filters.range(Parameter::Efficiency).contains(100.0));
        assert!(!cfg.filters.range(Parameter::FillFactor).contains(100.5));
        assert!(cfg.filters.range(Parameter::Jsc).contains(-1e9));
    }

    #[test]
    fn load_reads_partial_json() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            br#"{ "split_directions": true, "filters": { "voc": { "min": 0.5, "max": null } } }"#,
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = AnalysisConfig::load(&path).unwrap();

        assert!(cfg.split_directions);
        let voc = cfg.filters.range(Parameter::Voc);
        assert!(!voc.contains(0.4));
        assert!(voc.contains(5.0));
        // Untouched ranges keep their defaults.
        assert!(!cfg.filters.range(Parameter::Efficiency).contains(-1.0));
    }

    #[test]
    fn load_reports_the_path_on_bad_json() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"{ not json").unwrap();
        let path = temp.into_temp_path();
        let err = AnalysisConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing analysis config"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AnalysisConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("reading analysis config"));
    }
}
