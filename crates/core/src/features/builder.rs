//! Per-utterance feature construction.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::alignment::load_alignment;
use crate::audio::io::{load_audio, trim};
use crate::audio::{AutocorrelationTracker, PitchTracker, SpectralExtractor, TacotronStft};
use crate::config::PreprocessConfig;
use crate::error::{BuiltUtterance, DiscardReason, UtteranceOutcome};
use crate::features::aggregate::{fit_frames, interpolate_unvoiced, phoneme_average, voiced_count};
use crate::features::outlier::remove_outliers;
use crate::store::FeatureStore;
use crate::types::{PhoneAlignment, UtteranceFeatures};

/// Turns one aligned utterance into duration, pitch, energy and mel arrays.
///
/// Holds no mutable state, so a single builder can be shared by all
/// corpus workers.
pub struct UtteranceFeatureBuilder {
    sampling_rate: u32,
    hop_length: usize,
    pitch_averaging: bool,
    energy_averaging: bool,
    raw_path: PathBuf,
    textgrid_dir: PathBuf,
    pitch_tracker: Box<dyn PitchTracker>,
    extractor: Box<dyn SpectralExtractor>,
    store: FeatureStore,
}

impl UtteranceFeatureBuilder {
    pub fn new(
        config: &PreprocessConfig,
        pitch_tracker: Box<dyn PitchTracker>,
        extractor: Box<dyn SpectralExtractor>,
    ) -> Self {
        let p = &config.preprocessing;
        Self {
            sampling_rate: p.audio.sampling_rate,
            hop_length: p.stft.hop_length,
            pitch_averaging: p.pitch.phoneme_averaging(),
            energy_averaging: p.energy.phoneme_averaging(),
            raw_path: config.path.raw_path.clone(),
            textgrid_dir: config.textgrid_dir(),
            pitch_tracker,
            extractor,
            store: FeatureStore::new(&config.path.preprocessed_path),
        }
    }

    /// Builder with the default autocorrelation tracker and Tacotron STFT.
    pub fn from_config(config: &PreprocessConfig) -> Result<Self> {
        let stft = TacotronStft::from_config(config)?;
        Ok(Self::new(
            config,
            Box::new(AutocorrelationTracker::default()),
            Box::new(stft),
        ))
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn alignment_path(&self, speaker: &str, basename: &str) -> PathBuf {
        self.textgrid_dir
            .join(speaker)
            .join(format!("{}.TextGrid", basename))
    }

    /// Extract features from an already loaded waveform.
    ///
    /// `wav` is the full utterance at the configured sampling rate; it is
    /// trimmed to the alignment span here. Every returned array covers
    /// exactly `sum(durations)` frames (or one value per phone when
    /// averaging is on).
    pub fn build_features(
        &self,
        speaker: &str,
        basename: &str,
        wav: &[f64],
        alignment: &PhoneAlignment,
        raw_text: &str,
    ) -> Result<Result<UtteranceFeatures, DiscardReason>> {
        if alignment.is_degenerate() {
            return Ok(Err(DiscardReason::DegenerateAlignment {
                start: alignment.start_time,
                end: alignment.end_time,
            }));
        }

        let wav = trim(wav, self.sampling_rate, alignment.start_time, alignment.end_time);
        let n_frames = alignment.total_frames();

        let mut pitch = self
            .pitch_tracker
            .track(wav, self.sampling_rate, self.hop_length)
            .context("Pitch tracking failed")?;
        pitch.truncate(n_frames);
        let voiced = voiced_count(&pitch);
        if voiced <= 1 {
            return Ok(Err(DiscardReason::InsufficientVoicing { voiced }));
        }
        let mut pitch = fit_frames(pitch, n_frames);

        let spec = self.extractor.extract(wav).context("Spectral extraction failed")?;
        if spec.n_frames() != n_frames {
            log::debug!(
                "{}-{}: {} spectral frames for {} aligned frames",
                speaker,
                basename,
                spec.n_frames(),
                n_frames
            );
        }
        let mel = fit_frames(spec.mel, n_frames);
        let mut energy = fit_frames(spec.energy, n_frames);

        if self.pitch_averaging {
            pitch = phoneme_average(&interpolate_unvoiced(&pitch), &alignment.durations);
        }
        if self.energy_averaging {
            energy = phoneme_average(&energy, &alignment.durations);
        }

        Ok(Ok(UtteranceFeatures {
            speaker: speaker.to_string(),
            basename: basename.to_string(),
            phones: alignment.phones.clone(),
            durations: alignment.durations.clone(),
            pitch,
            energy,
            mel,
            raw_text: raw_text.to_string(),
        }))
    }

    /// Load, build and persist one utterance from the raw corpus layout.
    pub fn process(&self, speaker: &str, basename: &str) -> UtteranceOutcome {
        self.try_process(speaker, basename)
            .with_context(|| format!("{}/{}", speaker, basename))
            .into()
    }

    fn try_process(&self, speaker: &str, basename: &str) -> Result<Result<BuiltUtterance, DiscardReason>> {
        let tg_path = self.alignment_path(speaker, basename);
        if !tg_path.exists() {
            return Ok(Err(DiscardReason::MissingAlignment));
        }
        let alignment = load_alignment(&tg_path, self.sampling_rate, self.hop_length)?;
        if alignment.is_degenerate() {
            return Ok(Err(DiscardReason::DegenerateAlignment {
                start: alignment.start_time,
                end: alignment.end_time,
            }));
        }

        let speaker_dir = self.raw_path.join(speaker);
        let wav_path = speaker_dir.join(format!("{}.wav", basename));
        let wav = load_audio(&wav_path, self.sampling_rate)
            .with_context(|| format!("Failed to load audio: {}", wav_path.display()))?;
        let raw_text = read_raw_text(&speaker_dir.join(format!("{}.lab", basename)))?;

        let features = match self.build_features(speaker, basename, &wav, &alignment, &raw_text)? {
            Ok(f) => f,
            Err(reason) => return Ok(Err(reason)),
        };
        self.store.save_features(&features)?;

        Ok(Ok(BuiltUtterance {
            pitch_filtered: remove_outliers(&features.pitch),
            energy_filtered: remove_outliers(&features.energy),
            n_frames: features.mel_frames(),
            features,
        }))
    }
}

/// First line of a `.lab` transcript.
fn read_raw_text(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    Ok(contents.lines().next().unwrap_or("").to_string())
}
