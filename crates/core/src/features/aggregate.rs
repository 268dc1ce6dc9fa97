//! Frame-length reconciliation and phone-level aggregation.

/// Force a frame signal to exactly `n` frames.
///
/// Longer signals are truncated. Shorter ones are padded by repeating the
/// last frame (or `T::default()` when empty).
pub fn fit_frames<T: Clone + Default>(mut signal: Vec<T>, n: usize) -> Vec<T> {
    if signal.len() >= n {
        signal.truncate(n);
        return signal;
    }
    let fill = signal.last().cloned().unwrap_or_default();
    signal.resize(n, fill);
    signal
}

/// Number of voiced (non-zero) frames.
pub fn voiced_count(pitch: &[f64]) -> usize {
    pitch.iter().filter(|&&v| v != 0.0).count()
}

/// Fill unvoiced (zero) frames by linear interpolation between the nearest
/// voiced neighbours. Frames before the first / after the last voiced frame
/// take that frame's value. A fully unvoiced curve is returned unchanged.
pub fn interpolate_unvoiced(pitch: &[f64]) -> Vec<f64> {
    let voiced: Vec<usize> = (0..pitch.len()).filter(|&i| pitch[i] != 0.0).collect();
    let (Some(&first), Some(&last)) = (voiced.first(), voiced.last()) else {
        return pitch.to_vec();
    };

    let mut out = pitch.to_vec();
    out[..first].fill(pitch[first]);
    out[last + 1..].fill(pitch[last]);

    for pair in voiced.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (va, vb) = (pitch[a], pitch[b]);
        let span = (b - a) as f64;
        for (k, slot) in out[a + 1..b].iter_mut().enumerate() {
            let t = (k + 1) as f64 / span;
            *slot = va + (vb - va) * t;
        }
    }

    out
}

/// Collapse a frame curve to one value per phone by averaging each phone's
/// frame window. Zero-duration phones get 0.
///
/// Frames beyond the end of `values` are ignored; a window that falls
/// entirely outside yields 0.
pub fn phoneme_average(values: &[f64], durations: &[usize]) -> Vec<f64> {
    let mut pos = 0;
    durations
        .iter()
        .map(|&d| {
            let start = pos.min(values.len());
            let end = (pos + d).min(values.len());
            pos += d;
            if end > start {
                values[start..end].iter().sum::<f64>() / (end - start) as f64
            } else {
                0.0
            }
        })
        .collect()
}
