//! Frame-rate fundamental frequency tracking.

use anyhow::{Result, bail};

/// Produces one F0 value per analysis frame; unvoiced frames are 0.
///
/// Frame `i` is centred on sample `i * hop_length`, so a waveform of `n`
/// samples yields `n / hop_length + 1` frames.
pub trait PitchTracker: Send + Sync {
    fn track(&self, samples: &[f64], sampling_rate: u32, hop_length: usize) -> Result<Vec<f64>>;
}

/// Compute RMS energy of the entire signal.
pub fn compute_rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Estimate fundamental frequency using autocorrelation.
///
/// Finds the first autocorrelation peak above a periodicity threshold,
/// searching from the shortest lag (highest frequency) to avoid octave errors.
///
/// Returns F0 in Hz, or `None` for silence, noise, or weak periodicity.
pub fn estimate_f0(samples: &[f64], sr: u32, f0_min: f64, f0_max: f64, threshold: f64) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }

    if compute_rms(samples) < 1e-6 {
        return None;
    }

    let lag_min = ((sr as f64 / f0_max).floor() as usize).max(1);
    let lag_max = ((sr as f64 / f0_min).ceil() as usize).min(samples.len() - 1);

    if lag_min >= lag_max {
        return None;
    }

    // Remove DC offset
    let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
    let x: Vec<f64> = samples.iter().map(|s| s - mean).collect();

    let autocorr_0: f64 = x.iter().map(|v| v * v).sum();
    if autocorr_0 < 1e-12 {
        return None;
    }

    let autocorr: Vec<f64> = (lag_min..=lag_max)
        .map(|lag| {
            let sum: f64 = x[..x.len() - lag]
                .iter()
                .zip(x[lag..].iter())
                .map(|(a, b)| a * b)
                .sum();
            sum / autocorr_0
        })
        .collect();

    // Check left boundary
    if autocorr.len() >= 2 && autocorr[0] >= threshold && autocorr[0] >= autocorr[1] {
        return Some(sr as f64 / lag_min as f64);
    }

    for i in 1..autocorr.len().saturating_sub(1) {
        if autocorr[i] >= threshold
            && autocorr[i] >= autocorr[i - 1]
            && autocorr[i] >= autocorr[i + 1]
        {
            return Some(sr as f64 / refine_lag(&autocorr, i, lag_min));
        }
    }

    None
}

/// Parabolic interpolation around an autocorrelation peak.
fn refine_lag(autocorr: &[f64], i: usize, lag_min: usize) -> f64 {
    let (a, b, c) = (autocorr[i - 1], autocorr[i], autocorr[i + 1]);
    let denom = a - 2.0 * b + c;
    let offset = if denom.abs() > 1e-12 { 0.5 * (a - c) / denom } else { 0.0 };
    (lag_min + i) as f64 + offset.clamp(-0.5, 0.5)
}

/// Per-frame normalized autocorrelation tracker.
///
/// The analysis window spans `periods` cycles of `f0_min` so even the lowest
/// pitch has enough support.
#[derive(Debug, Clone)]
pub struct AutocorrelationTracker {
    pub f0_min: f64,
    pub f0_max: f64,
    /// Minimum normalized autocorrelation for a frame to count as voiced
    pub threshold: f64,
    pub periods: f64,
}

impl Default for AutocorrelationTracker {
    fn default() -> Self {
        Self {
            f0_min: 71.0,
            f0_max: 800.0,
            threshold: 0.45,
            periods: 2.5,
        }
    }
}

impl AutocorrelationTracker {
    fn window_len(&self, sampling_rate: u32) -> usize {
        (self.periods * sampling_rate as f64 / self.f0_min).ceil() as usize
    }
}

impl PitchTracker for AutocorrelationTracker {
    fn track(&self, samples: &[f64], sampling_rate: u32, hop_length: usize) -> Result<Vec<f64>> {
        if hop_length == 0 || sampling_rate == 0 {
            bail!("hop_length and sampling_rate must be positive");
        }
        if self.f0_min <= 0.0 || self.f0_min >= self.f0_max {
            bail!("Invalid F0 range {}..{}", self.f0_min, self.f0_max);
        }

        let n_frames = samples.len() / hop_length + 1;
        let half = self.window_len(sampling_rate) / 2;

        let f0 = (0..n_frames)
            .map(|i| {
                let center = i * hop_length;
                let start = center.saturating_sub(half).min(samples.len());
                let end = (center + half).min(samples.len());
                estimate_f0(&samples[start..end], sampling_rate, self.f0_min, self.f0_max, self.threshold)
                    .unwrap_or(0.0)
            })
            .collect();

        Ok(f0)
    }
}
