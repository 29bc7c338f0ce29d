use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use techcheck::analyzer::{self, ScanOptions};
use techcheck::error::TechcheckError;
use techcheck::extract::{StatsTool, DEFAULT_OIIOTOOL};
use techcheck::format;
use techcheck::logging;
use techcheck::report;

const EXIT_NOT_A_DIRECTORY: u8 = 2;
const EXIT_NO_SEQUENCES: u8 = 3;
const EXIT_REPORT_FAILED: u8 = 4;

#[derive(Parser)]
#[command(name = "techcheck", about = "Technical QC of rendered image sequences")]
struct Cli {
    /// Path to the directory to check for valid files
    #[arg(short = 'd', long)]
    dirpath: PathBuf,

    /// Path to the output directory to save analysis
    #[arg(short = 'o', long)]
    outpath: PathBuf,

    /// oiiotool binary used to compute hash and stats
    #[arg(long, env = "OIIOTOOL", default_value = DEFAULT_OIIOTOOL)]
    oiiotool: PathBuf,

    /// Seconds to wait for oiiotool on one file (0 waits forever)
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Number of parallel oiiotool jobs (default: number of CPU cores)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Print the scan result as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Directory for the daily log file (default: ~/oiio_techcheck)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log debug detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_dir = cli.log_dir.clone().unwrap_or_else(logging::default_log_dir);
    let level = if cli.verbose { "debug" } else { "info" };
    let _logger = logging::setup_logging(&log_dir, level)
        .with_context(|| format!("Failed to start logging in {}", log_dir.display()))?;

    let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
    let options = ScanOptions {
        tool: StatsTool::new(&cli.oiiotool).with_timeout(timeout),
        jobs: cli.jobs.unwrap_or_else(analyzer::default_jobs),
    };

    let start = Instant::now();
    let result = match analyzer::scan_directory(&cli.dirpath, &options) {
        Ok(result) => result,
        Err(e @ TechcheckError::NotADirectory(_)) => {
            error!("{}", e);
            return Ok(ExitCode::from(EXIT_NOT_A_DIRECTORY));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to scan {}", cli.dirpath.display())));
        }
    };

    if cli.json {
        println!("{}", format::format_json(&result));
    } else {
        println!("{}", format::format_table(&result));
    }

    if result.sequences.is_empty() {
        warn!("No sequences with extracted frames in {}", cli.dirpath.display());
        return Ok(ExitCode::from(EXIT_NO_SEQUENCES));
    }

    let reports = report::write_reports(&result, &cli.outpath)
        .with_context(|| format!("Failed to write reports to {}", cli.outpath.display()))?;

    info!(
        "Wrote {} reports for {} in {:.2}s",
        reports.written.len(),
        cli.dirpath.display(),
        start.elapsed().as_secs_f64()
    );

    if !reports.failed.is_empty() {
        error!(
            "{} of {} reports could not be saved: {}",
            reports.failed.len(),
            result.sequences.len(),
            reports.failed.join(", ")
        );
        return Ok(ExitCode::from(EXIT_REPORT_FAILED));
    }

    Ok(ExitCode::SUCCESS)
}
