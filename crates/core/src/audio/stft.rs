//! Mel-spectrogram and energy extraction.
//!
//! `TacotronStft` follows the Tacotron 2 feature recipe: reflect-padded STFT
//! with a periodic Hann window, magnitude spectrum, Slaney-normalized mel
//! filterbank and natural-log dynamic range compression. Energy is the L2
//! norm of each magnitude frame.

use std::sync::Arc;

use anyhow::{Result, bail};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::PreprocessConfig;

/// Floor applied before log compression.
const CLIP_VAL: f64 = 1e-5;

/// Frame-rate spectral features for one waveform.
#[derive(Debug, Clone, Default)]
pub struct Spectrogram {
    /// Log-mel frames, time-major (frames x n_mels)
    pub mel: Vec<Vec<f32>>,
    /// Per-frame energy, same frame count as `mel`
    pub energy: Vec<f64>,
}

impl Spectrogram {
    pub fn n_frames(&self) -> usize {
        self.mel.len()
    }
}

/// Produces a mel-spectrogram and energy curve at the configured hop.
///
/// Implementations must use the same framing as the pitch tracker:
/// `n / hop_length + 1` frames centred on `i * hop_length`.
pub trait SpectralExtractor: Send + Sync {
    fn extract(&self, samples: &[f64]) -> Result<Spectrogram>;
}

pub struct TacotronStft {
    filter_length: usize,
    hop_length: usize,
    /// Periodic Hann of `win_length`, zero-padded (centred) to `filter_length`
    window: Vec<f64>,
    /// n_mels x (filter_length / 2 + 1)
    mel_basis: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for TacotronStft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TacotronStft")
            .field("filter_length", &self.filter_length)
            .field("hop_length", &self.hop_length)
            .field("n_mels", &self.mel_basis.len())
            .finish()
    }
}

impl TacotronStft {
    pub fn new(
        filter_length: usize,
        hop_length: usize,
        win_length: usize,
        n_mels: usize,
        sampling_rate: u32,
        fmin: f64,
        fmax: f64,
    ) -> Result<Self> {
        if filter_length == 0 || hop_length == 0 || win_length == 0 {
            bail!("STFT lengths must be positive");
        }
        if win_length > filter_length {
            bail!("win_length ({}) exceeds filter_length ({})", win_length, filter_length);
        }
        if n_mels == 0 || fmin < 0.0 || fmin >= fmax {
            bail!("Invalid mel parameters: {} bands, {}..{} Hz", n_mels, fmin, fmax);
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(filter_length);

        Ok(Self {
            filter_length,
            hop_length,
            window: padded_hann(win_length, filter_length),
            mel_basis: slaney_mel_filterbank(sampling_rate, filter_length, n_mels, fmin, fmax),
            fft,
        })
    }

    pub fn from_config(config: &PreprocessConfig) -> Result<Self> {
        let p = &config.preprocessing;
        Self::new(
            p.stft.filter_length,
            p.stft.hop_length,
            p.stft.win_length,
            p.mel.n_mel_channels,
            p.audio.sampling_rate,
            p.mel.mel_fmin,
            p.mel.mel_fmax,
        )
    }

    /// Magnitude spectrum frames (frames x n_freqs).
    fn magnitudes(&self, samples: &[f64]) -> Vec<Vec<f64>> {
        let pad = self.filter_length / 2;
        let clipped: Vec<f64> = samples.iter().map(|s| s.clamp(-1.0, 1.0)).collect();
        let padded: Vec<f64> = (0..clipped.len() + 2 * pad)
            .map(|i| reflect_sample(&clipped, i as isize - pad as isize))
            .collect();

        // An odd filter_length pads an empty input short of one frame
        let Some(span) = padded.len().checked_sub(self.filter_length) else {
            return Vec::new();
        };
        let n_frames = span / self.hop_length + 1;
        let n_freqs = self.filter_length / 2 + 1;

        let mut buffer = vec![Complex::new(0.0, 0.0); self.filter_length];
        let mut frames = Vec::with_capacity(n_frames);
        for i in 0..n_frames {
            let start = i * self.hop_length;
            for (j, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + j] * self.window[j], 0.0);
            }
            self.fft.process(&mut buffer);
            frames.push(buffer[..n_freqs].iter().map(|c| c.norm()).collect());
        }
        frames
    }
}

impl SpectralExtractor for TacotronStft {
    fn extract(&self, samples: &[f64]) -> Result<Spectrogram> {
        let magnitudes = self.magnitudes(samples);

        let mut mel = Vec::with_capacity(magnitudes.len());
        let mut energy = Vec::with_capacity(magnitudes.len());
        for frame in &magnitudes {
            mel.push(
                self.mel_basis
                    .iter()
                    .map(|filter| {
                        let v: f64 = filter.iter().zip(frame.iter()).map(|(w, m)| w * m).sum();
                        v.max(CLIP_VAL).ln() as f32
                    })
                    .collect(),
            );
            energy.push(frame.iter().map(|m| m * m).sum::<f64>().sqrt());
        }

        Ok(Spectrogram { mel, energy })
    }
}

/// Sample at `idx` under reflect padding (edge sample not repeated).
fn reflect_sample(samples: &[f64], idx: isize) -> f64 {
    let n = samples.len() as isize;
    match n {
        0 => 0.0,
        1 => samples[0],
        _ => {
            let period = 2 * (n - 1);
            let mut i = idx.rem_euclid(period);
            if i >= n {
                i = period - i;
            }
            samples[i as usize]
        }
    }
}

fn padded_hann(win_length: usize, filter_length: usize) -> Vec<f64> {
    let mut window = vec![0.0; filter_length];
    let offset = (filter_length - win_length) / 2;
    for n in 0..win_length {
        window[offset + n] =
            0.5 - 0.5 * (std::f64::consts::TAU * n as f64 / win_length as f64).cos();
    }
    window
}

fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters on the Slaney scale with area normalization.
fn slaney_mel_filterbank(sr: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Vec<Vec<f64>> {
    let n_freqs = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * sr as f64 / n_fft as f64)
        .collect();

    let (mel_min, mel_max) = (hz_to_mel(fmin), hz_to_mel(fmax));
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
            let enorm = 2.0 / (hi - lo);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - lo) / (center - lo);
                    let upper = (hi - f) / (hi - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}
