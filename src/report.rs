use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::Result;
use crate::models::{ScanResult, SequenceSummary};

const REPORT_SUFFIX: &str = "techcheck";
const REPORT_EXTENSION: &str = "json";

/// `<out_dir>/<stem>_techcheck.json` for a sequence.
pub fn report_path(out_dir: &Path, summary: &SequenceSummary) -> PathBuf {
    out_dir.join(format!(
        "{}_{}.{}",
        summary.name, REPORT_SUFFIX, REPORT_EXTENSION
    ))
}

/// Save a sequence summary as pretty-printed JSON, replacing any existing report.
pub fn write_report(summary: &SequenceSummary, out_dir: &Path) -> Result<PathBuf> {
    let path = report_path(out_dir, summary);
    let mut json = serde_json::to_string_pretty(summary)?;
    json.push('\n');
    std::fs::write(&path, json)?;
    info!("Saved stats file: {}", path.display());
    Ok(path)
}

/// Reports saved by [`write_reports`], and the sequences whose report could not be saved.
#[derive(Debug, Default)]
pub struct WrittenReports {
    pub written: Vec<PathBuf>,
    pub failed: Vec<String>,
}

/// Write one report per sequence of a scan. A failing sequence does not stop the others.
pub fn write_reports(result: &ScanResult, out_dir: &Path) -> Result<WrittenReports> {
    std::fs::create_dir_all(out_dir)?;

    let mut reports = WrittenReports::default();
    for summary in result.sequences.values() {
        match write_report(summary, out_dir) {
            Ok(path) => reports.written.push(path),
            Err(e) => {
                error!("Failed to save report for {}: {}", summary.name, e);
                reports.failed.push(summary.name.clone());
            }
        }
    }
    Ok(reports)
}

/// Load a previously written report. Returns `None` if it is missing or cannot be parsed.
pub fn load_report(path: &Path) -> Option<SequenceSummary> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
