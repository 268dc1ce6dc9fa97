//! Phone/duration extraction from a forced-alignment tier.

use std::path::Path;

use anyhow::Result;

use super::textgrid;
use crate::types::{PhoneAlignment, Segment};

/// Labels the aligner emits for silence and non-speech.
pub const SILENCE_PHONES: &[&str] = &["sil", "sp", "spn"];

pub fn is_silence(label: &str) -> bool {
    SILENCE_PHONES.contains(&label)
}

/// Convert a time in seconds to a (fractional) frame index.
fn frame_position(t: f64, sampling_rate: u32, hop_length: usize) -> f64 {
    t * sampling_rate as f64 / hop_length as f64
}

/// Duration of a segment in frames.
///
/// Both boundaries are rounded in the frame domain before subtracting so
/// consecutive phones share boundaries and durations do not drift.
/// Ties round to even.
pub fn frame_duration(start: f64, end: f64, sampling_rate: u32, hop_length: usize) -> usize {
    let s = frame_position(start, sampling_rate, hop_length).round_ties_even();
    let e = frame_position(end, sampling_rate, hop_length).round_ties_even();
    (e - s).max(0.0) as usize
}

/// Build the trimmed phone sequence for one utterance.
///
/// Leading silence is skipped entirely; once the first real phone is seen
/// every segment is kept, and the result is cut back to the last non-silence
/// phone. Internal silences keep their durations.
pub fn get_alignment(segments: &[Segment], sampling_rate: u32, hop_length: usize) -> PhoneAlignment {
    let mut phones: Vec<String> = Vec::new();
    let mut durations: Vec<usize> = Vec::new();
    let mut start_time = 0.0;
    let mut end_time = 0.0;
    let mut end_idx = 0;

    for seg in segments {
        let silent = is_silence(&seg.label);

        if phones.is_empty() {
            if silent {
                continue;
            }
            start_time = seg.start;
        }

        phones.push(seg.label.clone());
        if !silent {
            end_time = seg.end;
            end_idx = phones.len();
        }

        durations.push(frame_duration(seg.start, seg.end, sampling_rate, hop_length));
    }

    phones.truncate(end_idx);
    durations.truncate(end_idx);

    PhoneAlignment {
        phones,
        durations,
        start_time,
        end_time,
    }
}

/// Read the `phones` tier of a TextGrid and trim it.
pub fn load_alignment(path: &Path, sampling_rate: u32, hop_length: usize) -> Result<PhoneAlignment> {
    let segments = textgrid::phones(path)?;
    Ok(get_alignment(&segments, sampling_rate, hop_length))
}
