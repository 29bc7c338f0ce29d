use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Parsed statistics for one image file, one entry per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub hash: String,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub avg: Vec<f64>,
    pub stddev: Vec<f64>,
    #[serde(rename = "nan")]
    pub nan_count: Vec<u64>,
    #[serde(rename = "inf")]
    pub inf_count: Vec<u64>,
}

impl FrameStats {
    pub fn channels(&self) -> usize {
        self.max.len()
    }

    pub fn has_nan(&self) -> bool {
        self.nan_count.iter().copied().max().unwrap_or(0) > 0
    }

    pub fn has_inf(&self) -> bool {
        self.inf_count.iter().copied().max().unwrap_or(0) > 0
    }
}

/// One member file of a sequence. `stats` is `None` when extraction failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub file: String,
    pub stats: Option<FrameStats>,
}

/// A member file as found by the grouper, before any stats are collected.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameFile {
    pub key: String,
    pub path: PathBuf,
}

/// A named run of frames sharing a basename stem.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub path: String,
    pub files: Vec<FrameFile>,
    pub frames: BTreeMap<String, Frame>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            files: Vec::new(),
            frames: BTreeMap::new(),
        }
    }

    pub fn extracted_frames(&self) -> usize {
        self.frames.values().filter(|f| f.stats.is_some()).count()
    }
}

/// Persisted per-sequence report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub name: String,
    pub path: String,
    pub frames: BTreeMap<String, Frame>,
    #[serde(rename = "maximum")]
    pub overall_max: Vec<f64>,
    #[serde(rename = "minimum")]
    pub overall_min: Vec<f64>,
    #[serde(rename = "nans")]
    pub nan_frames: Vec<String>,
    #[serde(rename = "infs")]
    pub inf_frames: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub path: PathBuf,
    pub sequences: BTreeMap<String, SequenceSummary>,
    /// Frame files whose tool output did not match the expected report layout.
    #[serde(default)]
    pub malformed: Vec<PathBuf>,
    /// Sequences left out of `sequences`, with the reason.
    #[serde(default)]
    pub dropped: Vec<(String, String)>,
}
