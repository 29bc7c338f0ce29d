use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TechcheckError>;

#[derive(Debug, Error)]
pub enum TechcheckError {
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stats tool timed out after {secs}s on {path}")]
    ToolTimeout { path: PathBuf, secs: u64 },

    /// The tool printed something, but not the report layout we parse.
    #[error("Malformed stats output for {path}: {reason}")]
    MalformedOutput { path: PathBuf, reason: String },

    #[error("Channel count mismatch in {sequence} at frame {frame}: expected {expected}, found {found}")]
    ChannelMismatch {
        sequence: String,
        frame: String,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TechcheckError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
