use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use techcheck::analyzer::{self, ScanOptions};
use techcheck::error::TechcheckError;
use techcheck::extract::{self, StatsTool};
use techcheck::models::SequenceSummary;
use techcheck::report;

/// Write a stand-in for oiiotool that prints the contents of the image file it
/// is given. Files containing SLEEP hang instead, to exercise timeouts.
#[cfg(unix)]
fn fake_oiiotool(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("oiiotool");
    let script = "#!/bin/sh\n\
                  for f; do :; done\n\
                  grep -q SLEEP \"$f\" && exec sleep 5\n\
                  grep -q WARN \"$f\" && echo \"oiiotool: warning for $f\" >&2\n\
                  cat \"$f\"\n";
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Tool output for a three channel frame.
fn stats_text(hash: &str, max: &str, nan: &str, inf: &str) -> String {
    format!(
        "Computing stats\nSHA-1: {}\nMin: 0.0 0.0 0.0\nMax: {}\nAvg: 0.5 0.4 0.45\nStdDev: 0.1 0.1 0.1\nNanCount: {}\nInfCount: {}\n",
        hash, max, nan, inf
    )
}

#[cfg(unix)]
fn setup_shot_dir() -> (tempfile::TempDir, PathBuf) {
    let tools = tempfile::tempdir().unwrap();
    let tool = fake_oiiotool(tools.path());
    let dir = tools.path().join("renders");
    std::fs::create_dir(&dir).unwrap();

    std::fs::write(
        dir.join("shot01.0001.exr"),
        stats_text("AAAA0001", "1.0 0.9 0.95", "0 0 0", "0 0 0"),
    )
    .unwrap();
    std::fs::write(
        dir.join("shot01.0002.exr"),
        stats_text("AAAA0002", "0.8 1.5 0.7", "0 0 1", "0 0 0"),
    )
    .unwrap();
    std::fs::write(
        dir.join("shot01.0003.exr"),
        stats_text("AAAA0003", "0.5 0.5 2.25", "0 0 0", "4 0 0"),
    )
    .unwrap();
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
    // oiiotool gives nothing back for these, so the sequence is dropped.
    std::fs::write(dir.join("broken.0001.exr"), "").unwrap();

    (tools, tool)
}

#[cfg(unix)]
fn options(tool: &Path) -> ScanOptions {
    ScanOptions {
        tool: StatsTool::new(tool),
        jobs: 2,
    }
}

// --- Stats extraction through a real subprocess ---

#[cfg(unix)]
#[test]
fn test_extract_well_formed_output() {
    let dir = tempfile::tempdir().unwrap();
    let tool = StatsTool::new(fake_oiiotool(dir.path()));
    let image = dir.path().join("a.0001.exr");
    std::fs::write(
        &image,
        "ok\nStats: ABCD1234\nMin: 0.0 0.0 0.0\nMax: 1.0 0.9 0.95\nAvg: 0.5 0.4 0.45\nStdDev: 0.1 0.1 0.1\nNanCount: 0 0 0\nInfCount: 0 0 0",
    )
    .unwrap();

    let stats = extract::extract_stats(&tool, &image).unwrap().unwrap();
    assert_eq!(stats.hash, "ABCD1234");
    assert_eq!(stats.max, vec![1.0, 0.9, 0.95]);
    assert_eq!(stats.nan_count, vec![0, 0, 0]);
}

#[cfg(unix)]
#[test]
fn test_extract_without_output_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let tool = StatsTool::new(fake_oiiotool(dir.path()));
    let image = dir.path().join("a.0001.exr");
    std::fs::write(&image, "").unwrap();

    assert!(extract::extract_stats(&tool, &image).unwrap().is_none());
}

#[cfg(unix)]
#[test]
fn test_extract_stderr_does_not_stop_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let tool = StatsTool::new(fake_oiiotool(dir.path()));
    let image = dir.path().join("a.0001.exr");
    let mut text = stats_text("BEEF", "1.0 1.0 1.0", "0 0 0", "0 0 0");
    text.push_str("WARN\n");
    std::fs::write(&image, text).unwrap();

    let output = tool.run(&image).unwrap();
    assert!(output.stderr.contains("warning"));
    let stats = extract::extract_stats(&tool, &image).unwrap().unwrap();
    assert_eq!(stats.hash, "BEEF");
}

#[cfg(unix)]
#[test]
fn test_extract_truncated_output_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let tool = StatsTool::new(fake_oiiotool(dir.path()));
    let image = dir.path().join("a.0001.exr");
    std::fs::write(&image, "ok\nStats: ABCD1234\nMin: 0.0 0.0 0.0\n").unwrap();

    let err = extract::extract_stats(&tool, &image).unwrap_err();
    assert!(matches!(err, TechcheckError::MalformedOutput { .. }));
}

#[cfg(unix)]
#[test]
fn test_tool_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let tool = StatsTool::new(fake_oiiotool(dir.path()))
        .with_timeout(Some(std::time::Duration::from_millis(200)));
    let image = dir.path().join("a.0001.exr");
    std::fs::write(&image, "SLEEP").unwrap();

    let start = std::time::Instant::now();
    assert!(matches!(
        tool.run(&image),
        Err(TechcheckError::ToolTimeout { .. })
    ));
    assert!(extract::extract_stats(&tool, &image).unwrap().is_none());
    assert!(start.elapsed() < std::time::Duration::from_secs(5));
}

// --- Full scan ---

#[cfg(unix)]
#[test]
fn test_scan_directory() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");

    let result = analyzer::scan_directory(&dir, &options(&tool)).unwrap();

    assert_eq!(result.sequences.len(), 1);
    let shot = &result.sequences["shot01"];
    let keys: Vec<&str> = shot.frames.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["0001", "0002", "0003"]);
    assert_eq!(shot.overall_max, vec![1.0, 1.5, 2.25]);
    assert_eq!(shot.overall_min, vec![0.0, 0.0, 0.0]);
    assert_eq!(shot.nan_frames, vec!["0002"]);
    assert_eq!(shot.inf_frames, vec!["0003"]);
    assert_eq!(shot.frames["0002"].stats.as_ref().unwrap().hash, "AAAA0002");

    assert_eq!(result.dropped.len(), 1);
    assert_eq!(result.dropped[0].0, "broken");
    assert!(result.malformed.is_empty());
}

#[cfg(unix)]
#[test]
fn test_scan_records_malformed_frames() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");
    std::fs::write(dir.join("shot01.0004.exr"), "garbage\n").unwrap();

    let result = analyzer::scan_directory(&dir, &options(&tool)).unwrap();

    let shot = &result.sequences["shot01"];
    assert!(shot.frames["0004"].stats.is_none());
    assert_eq!(result.malformed, vec![dir.join("shot01.0004.exr")]);
}

#[cfg(unix)]
#[test]
fn test_scan_drops_channel_mismatch() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");
    std::fs::write(
        dir.join("shot01.0004.exr"),
        "ok\nSHA-1: FF\nMin: 0 0 0 0\nMax: 1 1 1 1\nAvg: 1 1 1 1\nStdDev: 0 0 0 0\nNanCount: 0 0 0 0\nInfCount: 0 0 0 0\n",
    )
    .unwrap();

    let result = analyzer::scan_directory(&dir, &options(&tool)).unwrap();

    assert!(result.sequences.is_empty());
    assert!(result
        .dropped
        .iter()
        .any(|(name, reason)| name == "shot01" && reason.contains("Channel count mismatch")));
}

// --- CLI ---

#[test]
fn test_cli_requires_paths() {
    cargo_bin_cmd!("techcheck").assert().failure();
}

#[test]
fn test_cli_not_a_directory() {
    let logs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("techcheck")
        .arg("--dirpath")
        .arg(logs.path().join("missing"))
        .arg("--outpath")
        .arg(out.path())
        .arg("--log-dir")
        .arg(logs.path())
        .assert()
        .code(2)
        .stderr(predicates::str::contains("Path is not a directory"));
}

#[cfg(unix)]
#[test]
fn test_cli_no_sequences() {
    let tools = tempfile::tempdir().unwrap();
    let tool = fake_oiiotool(tools.path());
    let dir = tools.path().join("renders");
    std::fs::create_dir(&dir).unwrap();
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
    let out = tools.path().join("out");

    cargo_bin_cmd!("techcheck")
        .arg("-d")
        .arg(&dir)
        .arg("-o")
        .arg(&out)
        .arg("--oiiotool")
        .arg(&tool)
        .arg("--log-dir")
        .arg(tools.path().join("logs"))
        .assert()
        .code(3);

    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn test_cli_writes_reports() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");
    let out = tools.path().join("out");
    let logs = tools.path().join("logs");

    let run = || {
        cargo_bin_cmd!("techcheck")
            .arg("-d")
            .arg(&dir)
            .arg("-o")
            .arg(&out)
            .arg("--oiiotool")
            .arg(&tool)
            .arg("--log-dir")
            .arg(&logs)
            .arg("-j")
            .arg("2")
            .assert()
            .success()
            .stdout(predicates::str::contains("shot01"))
            .stdout(predicates::str::contains("Dropped broken: no extracted frames"));
    };

    run();
    let report_path = out.join("shot01_techcheck.json");
    let first = std::fs::read(&report_path).unwrap();
    assert!(!out.join("broken_techcheck.json").exists());
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);

    // A second run over the same directory gives the same bytes.
    run();
    let second = std::fs::read(&report_path).unwrap();
    assert_eq!(first, second);

    let summary: SequenceSummary = report::load_report(&report_path).unwrap();
    assert_eq!(summary.name, "shot01");
    assert_eq!(summary.nan_frames, vec!["0002"]);
    assert_eq!(summary.inf_frames, vec!["0003"]);
    assert!(summary.path.ends_with("shot01.####.exr"));

    let log = std::fs::read_dir(&logs)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name().to_string_lossy().starts_with("oiio_techcheck_"))
        .map(|e| std::fs::read_to_string(e.path()).unwrap())
        .unwrap();
    assert!(log.contains(";INFO;Checking dirpath:"));
    assert!(log.contains("Saved stats file:"));
}

#[cfg(unix)]
#[test]
fn test_cli_report_write_failure() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");
    let out = tools.path().join("out");
    std::fs::create_dir_all(out.join("shot01_techcheck.json")).unwrap();

    cargo_bin_cmd!("techcheck")
        .arg("-d")
        .arg(&dir)
        .arg("-o")
        .arg(&out)
        .arg("--oiiotool")
        .arg(&tool)
        .arg("--log-dir")
        .arg(tools.path().join("logs"))
        .assert()
        .code(4)
        .stderr(predicates::str::contains("reports could not be saved: shot01"));
}

#[cfg(unix)]
#[test]
fn test_scan_keeps_every_sequence_sharing_a_stem() {
    let tools = tempfile::tempdir().unwrap();
    let tool = fake_oiiotool(tools.path());
    let dir = tools.path().join("renders");
    std::fs::create_dir(&dir).unwrap();
    for name in ["a.x.0001.exr", "a.y.0001.exr", "a.z.0001.exr"] {
        std::fs::write(
            dir.join(name),
            stats_text("AAAA", "1.0 1.0 1.0", "0 0 0", "0 0 0"),
        )
        .unwrap();
    }

    let result = analyzer::scan_directory(&dir, &options(&tool)).unwrap();
    let names: Vec<&str> = result.sequences.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["a", "a_exr", "a_z_exr"]);
    assert!(result.dropped.is_empty());

    let out = tools.path().join("out");
    let reports = report::write_reports(&result, &out).unwrap();
    assert_eq!(reports.written.len(), 3);
    assert!(reports.failed.is_empty());
}

#[cfg(unix)]
#[test]
fn test_cli_json_output() {
    let (tools, tool) = setup_shot_dir();
    let dir = tools.path().join("renders");

    let output = cargo_bin_cmd!("techcheck")
        .arg("-d")
        .arg(&dir)
        .arg("-o")
        .arg(tools.path().join("out"))
        .arg("--oiiotool")
        .arg(&tool)
        .arg("--log-dir")
        .arg(tools.path().join("logs"))
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["sequences"]["shot01"]["nans"], serde_json::json!(["0002"]));
}
