use std::collections::BTreeMap;

use crate::error::{Result, TechcheckError};
use crate::models::{Frame, FrameStats, Sequence, SequenceSummary};

fn extracted(frames: &BTreeMap<String, Frame>) -> impl Iterator<Item = (&String, &FrameStats)> {
    frames
        .iter()
        .filter_map(|(key, frame)| frame.stats.as_ref().map(|stats| (key, stats)))
}

/// Channel-wise maximum of every frame's `max` and minimum of every frame's `min`.
///
/// Frames without stats contribute nothing. Returns `(overall_max, overall_min)`,
/// both empty if no frame has stats. All frames must report the same channel count.
pub fn find_min_max(name: &str, frames: &BTreeMap<String, Frame>) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut overall_max: Vec<f64> = Vec::new();
    let mut overall_min: Vec<f64> = Vec::new();
    let mut channels: Option<usize> = None;

    for (key, stats) in extracted(frames) {
        let expected = *channels.get_or_insert(stats.channels());
        if stats.channels() != expected || stats.min.len() != expected {
            return Err(TechcheckError::ChannelMismatch {
                sequence: name.to_string(),
                frame: key.clone(),
                expected,
                found: stats.channels().max(stats.min.len()),
            });
        }

        if overall_max.is_empty() {
            overall_max = stats.max.clone();
            overall_min = stats.min.clone();
            continue;
        }
        for (acc, &v) in overall_max.iter_mut().zip(&stats.max) {
            *acc = acc.max(v);
        }
        for (acc, &v) in overall_min.iter_mut().zip(&stats.min) {
            *acc = acc.min(v);
        }
    }

    Ok((overall_max, overall_min))
}

/// Keys of frames with a NaN in any channel, in frame order.
pub fn find_nan_frames(frames: &BTreeMap<String, Frame>) -> Vec<String> {
    extracted(frames)
        .filter(|(_, stats)| stats.has_nan())
        .map(|(key, _)| key.clone())
        .collect()
}

/// Keys of frames with an Inf in any channel, in frame order.
pub fn find_inf_frames(frames: &BTreeMap<String, Frame>) -> Vec<String> {
    extracted(frames)
        .filter(|(_, stats)| stats.has_inf())
        .map(|(key, _)| key.clone())
        .collect()
}

/// Reduce a collected sequence into its report.
pub fn summarize(sequence: Sequence) -> Result<SequenceSummary> {
    let (overall_max, overall_min) = find_min_max(&sequence.name, &sequence.frames)?;
    let nan_frames = find_nan_frames(&sequence.frames);
    let inf_frames = find_inf_frames(&sequence.frames);

    Ok(SequenceSummary {
        name: sequence.name,
        path: sequence.path,
        frames: sequence.frames,
        overall_max,
        overall_min,
        nan_frames,
        inf_frames,
    })
}
