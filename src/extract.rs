use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error};
use regex::Regex;

use crate::error::{Result, TechcheckError};
use crate::models::FrameStats;

pub const DEFAULT_OIIOTOOL: &str = "/usr/local/bin/oiiotool";

/// Lines in an `oiiotool --hash --stats` report, counting the leading banner.
pub const REPORT_LINES: usize = 8;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

static HASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]+").unwrap());
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:\.[0-9]*)?|\.[0-9]+").unwrap());

/// The external statistics tool and how to run it.
#[derive(Debug, Clone)]
pub struct StatsTool {
    pub program: PathBuf,
    /// `None` waits for the tool forever.
    pub timeout: Option<Duration>,
}

impl Default for StatsTool {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_OIIOTOOL),
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// Captured streams of one tool invocation.
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl StatsTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `<tool> --hash --stats <path>` and capture both streams.
    pub fn run(&self, path: &Path) -> Result<ToolOutput> {
        let mut child = Command::new(&self.program)
            .arg("--hash")
            .arg("--stats")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TechcheckError::ToolLaunch {
                tool: self.program.clone(),
                source,
            })?;

        // Both pipes are drained concurrently so a chatty stderr cannot stall the child.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = self.timeout.map(|t| (Instant::now() + t, t));
        loop {
            if child.try_wait()?.is_some() {
                break;
            }
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TechcheckError::ToolTimeout {
                        path: path.to_path_buf(),
                        secs: timeout.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }

        let collect = |handle: Option<JoinHandle<String>>| {
            handle
                .map(|h| h.join().unwrap_or_default())
                .unwrap_or_default()
        };

        Ok(ToolOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn numbers<'a>(path: &Path, label: &str, line: &'a str) -> Result<Vec<&'a str>> {
    let tokens: Vec<&str> = NUMBER_RE.find_iter(line).map(|m| m.as_str()).collect();
    if tokens.is_empty() {
        return Err(TechcheckError::malformed(
            path,
            format!("no {} values in line {:?}", label, line),
        ));
    }
    Ok(tokens)
}

fn parse_floats(path: &Path, label: &str, line: &str) -> Result<Vec<f64>> {
    numbers(path, label, line)?
        .into_iter()
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                TechcheckError::malformed(path, format!("bad {} value {:?}", label, t))
            })
        })
        .collect()
}

/// Counts must be whole numbers that fit a `u64`; `3` and `3.0` are accepted, `2.5` is not.
fn parse_counts(path: &Path, label: &str, line: &str) -> Result<Vec<u64>> {
    numbers(path, label, line)?
        .into_iter()
        .map(|t| {
            t.parse::<u64>()
                .ok()
                .or_else(|| {
                    t.parse::<f64>()
                        .ok()
                        .filter(|v| v.fract() == 0.0 && *v < u64::MAX as f64)
                        .map(|v| v as u64)
                })
                .ok_or_else(|| {
                    TechcheckError::malformed(path, format!("bad {} count {:?}", label, t))
                })
        })
        .collect()
}

/// Parse the textual report of `oiiotool --hash --stats`.
///
/// Precondition: at least [`REPORT_LINES`] lines, laid out as
///
/// ```text
/// 0  banner (ignored)
/// 1  <label>: <HASH>
/// 2  min values, one per channel
/// 3  max values
/// 4  avg values
/// 5  stddev values
/// 6  NaN counts
/// 7  Inf counts
/// ```
///
/// Postcondition: every vector is non-empty and all six have the same length.
/// Anything else is reported as [`TechcheckError::MalformedOutput`].
pub fn parse_stats_output(path: &Path, stdout: &str) -> Result<FrameStats> {
    let lines: Vec<&str> = stdout.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    if lines.len() < REPORT_LINES {
        return Err(TechcheckError::malformed(
            path,
            format!("expected {} lines, got {}", REPORT_LINES, lines.len()),
        ));
    }

    let hash = lines[1]
        .split_once(':')
        .and_then(|(_, rest)| HASH_RE.find(rest))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            TechcheckError::malformed(path, format!("no hash in line {:?}", lines[1]))
        })?;

    let stats = FrameStats {
        hash,
        min: parse_floats(path, "min", lines[2])?,
        max: parse_floats(path, "max", lines[3])?,
        avg: parse_floats(path, "avg", lines[4])?,
        stddev: parse_floats(path, "stddev", lines[5])?,
        nan_count: parse_counts(path, "nan", lines[6])?,
        inf_count: parse_counts(path, "inf", lines[7])?,
    };

    let channels = stats.max.len();
    let lengths = [
        stats.min.len(),
        stats.avg.len(),
        stats.stddev.len(),
        stats.nan_count.len(),
        stats.inf_count.len(),
    ];
    if lengths.iter().any(|&n| n != channels) {
        return Err(TechcheckError::malformed(
            path,
            format!("uneven channel counts: max has {}, others {:?}", channels, lengths),
        ));
    }

    Ok(stats)
}

/// Hash and statistics for one file.
///
/// `Ok(None)` means the tool could not give us anything (no output, failed to
/// launch, timed out); the cause is logged. Output that is present but does not
/// follow the report layout is an error.
pub fn extract_stats(tool: &StatsTool, path: &Path) -> Result<Option<FrameStats>> {
    debug!("Extracting stats: {}", path.display());
    let output = match tool.run(path) {
        Ok(output) => output,
        Err(e @ (TechcheckError::ToolLaunch { .. } | TechcheckError::ToolTimeout { .. })) => {
            error!("{}", e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    if !output.stderr.trim().is_empty() {
        error!("{}: {}", path.display(), output.stderr.trim());
    }

    if output.stdout.trim().is_empty() {
        error!("No stats output for {}", path.display());
        return Ok(None);
    }

    parse_stats_output(path, &output.stdout).map(Some)
}
