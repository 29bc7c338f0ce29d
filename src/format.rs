use crate::models::{ScanResult, SequenceSummary};

/// Format a channel vector as "a / b / c" with fixed precision.
pub fn format_channels(values: &[f64]) -> String {
    if values.is_empty() {
        return "-".to_string();
    }
    values
        .iter()
        .map(|v| format!("{:.4}", v))
        .collect::<Vec<_>>()
        .join(" / ")
}

fn format_row(summary: &SequenceSummary) -> String {
    format!(
        "{:<24} {:>6} {:>6} {:>6}  min {}  max {}\n",
        summary.name,
        summary.frames.len(),
        summary.nan_frames.len(),
        summary.inf_frames.len(),
        format_channels(&summary.overall_min),
        format_channels(&summary.overall_max),
    )
}

/// Format a scan result as a per-sequence table.
pub fn format_table(result: &ScanResult) -> String {
    let separator = "\u{2500}".repeat(72);
    let mut output = String::new();

    output.push_str(&format!(
        "{:<24} {:>6} {:>6} {:>6}  {}\n",
        "Sequence", "Frames", "NaN", "Inf", "Range"
    ));
    output.push_str(&separator);
    output.push('\n');

    for summary in result.sequences.values() {
        output.push_str(&format_row(summary));
    }

    output.push_str(&separator);
    output.push('\n');

    for (name, reason) in &result.dropped {
        output.push_str(&format!("Dropped {}: {}\n", name, reason));
    }
    for path in &result.malformed {
        output.push_str(&format!("Malformed stats output: {}\n", path.display()));
    }

    let flagged = result
        .sequences
        .values()
        .filter(|s| !s.nan_frames.is_empty() || !s.inf_frames.is_empty())
        .count();
    output.push_str(&format!(
        "Number of sequences: {}\n\
         Sequences with NaN/Inf: {}",
        result.sequences.len(),
        flagged,
    ));

    output
}

/// Format a scan result as pretty-printed JSON.
pub fn format_json(result: &ScanResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;

    fn result() -> ScanResult {
        let mut sequences = BTreeMap::new();
        sequences.insert(
            "shot01".to_string(),
            SequenceSummary {
                name: "shot01".to_string(),
                path: "/in/shot01.####.exr".to_string(),
                frames: BTreeMap::new(),
                overall_max: vec![1.0, 0.9, 0.95],
                overall_min: vec![0.0, 0.0, 0.0],
                nan_frames: vec!["0003".to_string()],
                inf_frames: vec![],
            },
        );
        ScanResult {
            path: PathBuf::from("/in"),
            sequences,
            malformed: vec![PathBuf::from("/in/shot01.0002.exr")],
            dropped: vec![("empty".to_string(), "no extracted frames".to_string())],
        }
    }

    #[test]
    fn test_format_channels() {
        assert_eq!(format_channels(&[1.0, 0.5, 0.25]), "1.0000 / 0.5000 / 0.2500");
        assert_eq!(format_channels(&[]), "-");
    }

    #[test]
    fn test_format_table() {
        let table = format_table(&result());
        assert!(table.contains("Sequence"));
        assert!(table.contains("shot01"));
        assert!(table.contains("max 1.0000 / 0.9000 / 0.9500"));
        assert!(table.contains("Dropped empty: no extracted frames"));
        assert!(table.contains("Malformed stats output: /in/shot01.0002.exr"));
        assert!(table.contains("Number of sequences: 1"));
        assert!(table.contains("Sequences with NaN/Inf: 1"));
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&result());
        let parsed: ScanResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sequences.len(), 1);
        assert_eq!(parsed.dropped.len(), 1);
    }
}
