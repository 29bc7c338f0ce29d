use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use flexi_logger::{DeferredNow, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle};
use log::Record;

pub const LOG_BASENAME: &str = "oiio_techcheck";

/// `$HOME/oiio_techcheck`, or `./oiio_techcheck` without a home directory.
pub fn default_log_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(LOG_BASENAME)
}

/// Log file basename for a given day, e.g. `oiio_techcheck_20240131`.
pub fn log_basename(date: NaiveDate) -> String {
    format!("{}_{}", LOG_BASENAME, date.format("%Y%m%d"))
}

/// `2024-01-31 12:00:00;INFO;message`
pub fn log_format(w: &mut dyn Write, now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
    write!(
        w,
        "{};{};{}",
        now.format("%Y-%m-%d %H:%M:%S"),
        record.level(),
        record.args()
    )
}

/// Start process logging into today's file under `log_dir`, appending to it if it exists.
///
/// The returned handle must be kept alive for as long as the process logs.
pub fn setup_logging(log_dir: &Path, level: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(log_basename(Local::now().date_naive()))
                .suppress_timestamp(),
        )
        .append()
        .format_for_files(log_format)
        .duplicate_to_stderr(Duplicate::Warn)
        .start()
}
