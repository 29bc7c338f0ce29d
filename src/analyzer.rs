use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::aggregate;
use crate::error::{Result, TechcheckError};
use crate::extract::{self, StatsTool};
use crate::models::{Frame, FrameFile, FrameStats, ScanResult, Sequence};
use crate::sequence;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub tool: StatsTool,
    /// Number of parallel extraction workers.
    pub jobs: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            tool: StatsTool::default(),
            jobs: default_jobs(),
        }
    }
}

/// Return the default number of parallel jobs (number of CPU cores).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

enum FrameOutcome {
    Stale,
    Extracted(Option<FrameStats>),
    Malformed(TechcheckError),
}

fn extract_frame(tool: &StatsTool, path: &Path) -> FrameOutcome {
    if !path.is_file() {
        return FrameOutcome::Stale;
    }
    frame_outcome(path, extract::extract_stats(tool, path))
}

/// Only a broken report layout counts as malformed; any other error is an
/// extraction failure and leaves the frame without stats.
fn frame_outcome(path: &Path, result: Result<Option<FrameStats>>) -> FrameOutcome {
    match result {
        Ok(stats) => FrameOutcome::Extracted(stats),
        Err(e @ TechcheckError::MalformedOutput { .. }) => FrameOutcome::Malformed(e),
        Err(e) => {
            error!("Extraction failed for {}: {}", path.display(), e);
            FrameOutcome::Extracted(None)
        }
    }
}

/// Run the stats tool over every member file of every sequence in parallel
/// and fill in each sequence's `frames`.
///
/// Failed extractions are stored as frames without stats; files that vanished
/// since grouping are left out. Returns the sequences together with the files
/// whose tool output was malformed.
pub fn collect_frames(mut sequences: Vec<Sequence>, options: &ScanOptions) -> (Vec<Sequence>, Vec<PathBuf>) {
    let work: Vec<(usize, FrameFile)> = sequences
        .iter()
        .enumerate()
        .flat_map(|(i, seq)| seq.files.iter().cloned().map(move |f| (i, f)))
        .collect();
    if work.is_empty() {
        return (sequences, Vec::new());
    }

    let jobs = options.jobs.max(1);
    let work = Arc::new(work);
    let tool = Arc::new(options.tool.clone());
    let next_index = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..jobs.min(work.len()) {
        let work = Arc::clone(&work);
        let tool = Arc::clone(&tool);
        let next_index = Arc::clone(&next_index);
        handles.push(std::thread::spawn(move || {
            let mut results = Vec::new();
            loop {
                let idx = next_index.fetch_add(1, Ordering::SeqCst);
                if idx >= work.len() {
                    break;
                }
                results.push((idx, extract_frame(&tool, &work[idx].1.path)));
            }
            results
        }));
    }

    // Workers only hand back outcomes; the frame maps are written here, once per key.
    let mut indexed_results = Vec::with_capacity(work.len());
    for handle in handles {
        match handle.join() {
            Ok(results) => indexed_results.extend(results),
            Err(_) => error!("Extraction worker panicked, its frames are missing"),
        }
    }
    indexed_results.sort_by_key(|(idx, _)| *idx);

    let mut malformed = Vec::new();
    for (idx, outcome) in indexed_results {
        let (seq_idx, file) = &work[idx];
        let stats = match outcome {
            FrameOutcome::Stale => {
                debug!("File no longer exists, skipping: {}", file.path.display());
                continue;
            }
            FrameOutcome::Extracted(stats) => stats,
            FrameOutcome::Malformed(e) => {
                error!("{}", e);
                malformed.push(file.path.clone());
                None
            }
        };
        let frame = Frame {
            file: file
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            stats,
        };
        sequences[*seq_idx].frames.insert(file.key.clone(), frame);
    }

    (sequences, malformed)
}

/// Group, extract and summarize every sequence in a directory.
///
/// Only a missing or unreadable `dir` is an error. Sequences with no extracted
/// frames, or whose frames disagree on channel count, are dropped from the
/// result and listed in `dropped`.
pub fn scan_directory(dir: &Path, options: &ScanOptions) -> Result<ScanResult> {
    let sequences = sequence::group_sequences(dir)?;
    let (sequences, malformed) = collect_frames(sequences, options);

    let mut result = ScanResult {
        path: dir.to_path_buf(),
        malformed,
        ..ScanResult::default()
    };

    for seq in sequences {
        if seq.extracted_frames() == 0 {
            info!("No frames extracted for {}, dropping", seq.name);
            result
                .dropped
                .push((seq.name, "no extracted frames".to_string()));
            continue;
        }

        let name = seq.name.clone();
        match aggregate::summarize(seq) {
            Ok(summary) => {
                info!(
                    "Summarized {}: {} frames, {} with NaN, {} with Inf",
                    name,
                    summary.frames.len(),
                    summary.nan_frames.len(),
                    summary.inf_frames.len()
                );
                result.sequences.insert(name, summary);
            }
            Err(e) => {
                warn!("{}", e);
                result.dropped.push((name, e.to_string()));
            }
        }
    }

    Ok(result)
}
