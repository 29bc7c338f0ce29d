use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;

use crate::error::{Result, TechcheckError};
use crate::models::{FrameFile, Sequence};

pub const IMAGE_EXTENSIONS: &[&str] = &["exr", "tif", "hdr", "jpg", "png"];

// Lazy head so the digits are the last run in the name.
static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)([0-9]+)([^0-9]*)$").unwrap());

/// Check if a path has a recognized image file extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A file name split around its frame number, e.g. `shot01.` `0042` `.exr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameName {
    pub head: String,
    pub frame: u64,
    pub pad: usize,
    pub tail: String,
}

impl FrameName {
    /// Frame number zero-padded to this file's own width.
    pub fn key(&self) -> String {
        format!("{:0width$}", self.frame, width = self.pad)
    }
}

pub fn parse_frame_name(file_name: &str) -> Option<FrameName> {
    let caps = FRAME_RE.captures(file_name)?;
    let digits = &caps[2];
    Some(FrameName {
        head: caps[1].to_string(),
        frame: digits.parse().ok()?,
        pad: digits.len(),
        tail: caps[3].to_string(),
    })
}

fn sequence_name(head: &str) -> String {
    let stem = head.split('.').next().unwrap_or_default();
    let stem = stem.trim_end_matches(['_', '-', ' ']);
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// Pick a sequence name not yet in `taken` and record it.
///
/// Tries the stem, then stem plus extension (shot.####.exr next to shot.####.png),
/// then the whole head plus extension (a.x.####.exr next to a.y.####.exr),
/// then numbered variants of that.
fn unique_name(taken: &mut BTreeSet<String>, head: &str, tail: &str) -> String {
    let stem = sequence_name(head);
    let ext = tail.trim_start_matches('.').replace('.', "_");
    let full = head.trim_end_matches(['.', '_', '-', ' ']).replace('.', "_");

    let mut candidates = vec![stem.clone(), format!("{}_{}", stem, ext)];
    if !full.is_empty() {
        candidates.push(format!("{}_{}", full, ext));
    }
    let base = candidates[candidates.len() - 1].clone();

    let mut name = candidates.into_iter().find(|c| !taken.contains(c));
    let mut n = 2;
    while name.is_none() {
        let numbered = format!("{}_{}", base, n);
        if !taken.contains(&numbered) {
            name = Some(numbered);
        }
        n += 1;
    }
    let name = name.unwrap_or(base);
    taken.insert(name.clone());
    name
}

/// Group the image files of a directory into frame sequences.
///
/// Files share a sequence when the text around their last digit run matches.
/// The returned sequences carry their member files; `frames` is left empty.
pub fn group_sequences(dir: &Path) -> Result<Vec<Sequence>> {
    if !dir.is_dir() {
        return Err(TechcheckError::NotADirectory(dir.to_path_buf()));
    }
    info!("Checking dirpath: {}", dir.display());

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_image_file(p))
        .collect();
    files.sort();

    let mut runs: BTreeMap<(String, String), Vec<(FrameName, PathBuf)>> = BTreeMap::new();
    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(frame) = parse_frame_name(name) else {
            debug!("No frame number in {}, skipping", path.display());
            continue;
        };
        if !path.is_file() {
            debug!("Stale file reference, skipping: {}", path.display());
            continue;
        }
        runs.entry((frame.head.clone(), frame.tail.clone()))
            .or_default()
            .push((frame, path));
    }

    let mut taken = BTreeSet::new();
    let mut sequences = Vec::with_capacity(runs.len());
    for ((head, tail), mut members) in runs {
        members.sort_by(|a, b| (a.0.frame, a.0.pad).cmp(&(b.0.frame, b.0.pad)));

        let name = unique_name(&mut taken, &head, &tail);

        let pad = members.first().map(|(f, _)| f.pad).unwrap_or(0);
        let pattern = dir.join(format!("{}{}{}", head, "#".repeat(pad), tail));

        let mut sequence = Sequence::new(name, pattern.display().to_string());
        sequence.files = members
            .into_iter()
            .map(|(frame, path)| FrameFile {
                key: frame.key(),
                path,
            })
            .collect();
        sequences.push(sequence);
    }

    info!("Found {} sequences in {}", sequences.len(), dir.display());
    Ok(sequences)
}
