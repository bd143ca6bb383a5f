use std::{
    fmt::Write as _,
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::narr::pipeline::AnalysisReport;

/// Writes analysis reports as pretty-printed JSON, one file per date.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    reports_dir: PathBuf,
    date_format: String,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(reports_dir: P, date_format: impl Into<String>) -> Self {
        Self {
            reports_dir: reports_dir.as_ref().to_owned(),
            date_format: date_format.into(),
        }
    }

    /// `report_<date>.json` for the report's analysis date.
    pub fn file_name(&self, report: &AnalysisReport) -> Result<String> {
        let mut name = String::from("report_");
        write!(name, "{}", report.analysis_date.format(&self.date_format))
            .map_err(|_| anyhow!("Invalid date format {:?}", self.date_format))?;
        name.push_str(".json");
        Ok(name)
    }

    /// Write the report, replacing any earlier report for the same date.
    pub fn save(&self, report: &AnalysisReport) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.reports_dir).with_context(|| {
            format!("Unable to create reports dir {}", self.reports_dir.display())
        })?;
        let path = self.reports_dir.join(self.file_name(report)?);
        let file = File::create(&path)
            .with_context(|| format!("Unable to create report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)
            .with_context(|| format!("Unable to write report {}", path.display()))?;
        writer.flush()?;
        info!(path = %path.display(), narratives = report.narratives_count, "report saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn report() -> AnalysisReport {
        AnalysisReport {
            analysis_date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            total_news: 3,
            narratives_count: 0,
            narratives: Vec::new(),
            quality: None,
            n_clusters: 0,
            n_noise: 3,
        }
    }

    #[test]
    fn test_save_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("reports"), "%Y-%m-%d");
        let path = writer.save(&report()).unwrap();
        assert_eq!(path.file_name().unwrap(), "report_2024-03-09.json");

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["total_news"], 3);
        assert_eq!(value["narratives_count"], 0);
        assert!(value.get("quality").is_none());

        let back: AnalysisReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, report());
    }

    #[test]
    fn test_custom_date_format() {
        let writer = ReportWriter::new("unused", "%d%m%Y");
        assert_eq!(writer.file_name(&report()).unwrap(), "report_09032024.json");
    }
}
