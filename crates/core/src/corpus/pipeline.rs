//! Three-pass corpus driver.
//!
//! 1. Build and persist features for every utterance, feeding outlier-filtered
//!    pitch/energy into streaming accumulators (optionally across workers).
//! 2. After all worker accumulators are merged, rescale every stored
//!    pitch/energy array with the final mean/std.
//! 3. Write speakers.json, stats.json and the shuffled train/val manifests.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::config::{PreprocessConfig, QuantityConfig};
use crate::corpus::dataset::{DatasetWriter, SpeakerMap};
use crate::corpus::normalize::normalize;
use crate::error::UtteranceOutcome;
use crate::features::{StreamingStats, UtteranceFeatureBuilder};
use crate::store::Quantity;
use crate::types::{CorpusStats, ManifestEntry, QuantityStats, UtteranceId};

/// Per-utterance outcome tally for one corpus pass.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub built: usize,
    /// Discard count per reason kind
    pub discarded: BTreeMap<&'static str, usize>,
    /// Hard failures with their error chain
    pub failed: Vec<(UtteranceId, String)>,
}

impl BatchReport {
    pub fn record(&mut self, id: &UtteranceId, outcome: &UtteranceOutcome) {
        match outcome {
            UtteranceOutcome::Built(_) => self.built += 1,
            UtteranceOutcome::Discarded(reason) => {
                log::debug!("Discarding {}: {}", id, reason);
                *self.discarded.entry(reason.kind()).or_insert(0) += 1;
            }
            UtteranceOutcome::Failed(e) => {
                log::warn!("Failed {}: {:#}", id, e);
                self.failed.push((id.clone(), format!("{:#}", e)));
            }
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.built += other.built;
        for (kind, n) in other.discarded {
            *self.discarded.entry(kind).or_insert(0) += n;
        }
        self.failed.extend(other.failed);
    }

    pub fn discarded_total(&self) -> usize {
        self.discarded.values().sum()
    }

    pub fn total(&self) -> usize {
        self.built + self.discarded_total() + self.failed.len()
    }
}

/// Everything pass 1 produces. Worker-local copies merge associatively.
#[derive(Debug, Default)]
struct PassOne {
    report: BatchReport,
    pitch: StreamingStats,
    energy: StreamingStats,
    entries: Vec<ManifestEntry>,
    built: Vec<UtteranceId>,
    n_frames: usize,
}

impl PassOne {
    fn absorb(&mut self, id: &UtteranceId, outcome: UtteranceOutcome) {
        self.report.record(id, &outcome);
        if let UtteranceOutcome::Built(built) = outcome {
            self.pitch.update(&built.pitch_filtered);
            self.energy.update(&built.energy_filtered);
            self.n_frames += built.n_frames;
            self.entries.push(built.features.manifest_entry());
            self.built.push(id.clone());
        }
    }

    fn merge(&mut self, other: PassOne) {
        self.report.merge(other.report);
        self.pitch.merge(&other.pitch);
        self.energy.merge(&other.energy);
        self.entries.extend(other.entries);
        self.built.extend(other.built);
        self.n_frames += other.n_frames;
    }
}

/// Result of a full preprocessing run.
#[derive(Debug, Clone)]
pub struct CorpusSummary {
    pub report: BatchReport,
    pub stats: CorpusStats,
    pub speakers: SpeakerMap,
    /// Manifest entries in their shuffled order (validation first)
    pub entries: Vec<ManifestEntry>,
    pub n_train: usize,
    pub n_val: usize,
    /// Total mel frames over built utterances
    pub total_frames: usize,
    pub hours: f64,
}

pub struct Preprocessor {
    config: PreprocessConfig,
    builder: UtteranceFeatureBuilder,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig, builder: UtteranceFeatureBuilder) -> Self {
        Self { config, builder }
    }

    /// Preprocessor with the default pitch tracker and STFT.
    pub fn from_config(config: PreprocessConfig) -> Result<Self> {
        let builder = UtteranceFeatureBuilder::from_config(&config)?;
        Ok(Self::new(config, builder))
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// List speakers (sorted directory names, ids in that order) and every
    /// `<speaker>/<basename>.wav` under the raw corpus.
    pub fn scan(&self) -> Result<(SpeakerMap, Vec<UtteranceId>)> {
        let raw = &self.config.path.raw_path;
        let mut speaker_names = Vec::new();
        for entry in read_dir_sorted(raw)? {
            if entry.is_dir() {
                if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                    speaker_names.push(name.to_string());
                }
            }
        }

        let mut speakers = SpeakerMap::new();
        let mut utterances = Vec::new();
        for (i, speaker) in speaker_names.iter().enumerate() {
            speakers.insert(speaker.clone(), i);
            for path in read_dir_sorted(&raw.join(speaker))? {
                let is_wav = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false);
                if !is_wav {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    utterances.push(UtteranceId::new(speaker, stem));
                }
            }
        }

        Ok((speakers, utterances))
    }

    /// Build one utterance. A panic inside the builder or its DSP
    /// collaborators fails that utterance only.
    fn process(&self, id: &UtteranceId) -> UtteranceOutcome {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.builder.process(&id.speaker, &id.basename)
        }));
        result.unwrap_or_else(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            UtteranceOutcome::Failed(anyhow!("{}: panicked: {}", id, msg))
        })
    }

    /// Pass 1 over `utterances`, split into contiguous chunks across
    /// `config.workers` threads. Returns only after every worker has joined.
    fn feature_pass(&self, utterances: &[UtteranceId]) -> Result<PassOne> {
        let workers = self.config.workers.max(1);
        if workers == 1 || utterances.len() < 2 {
            let mut pass = PassOne::default();
            for id in utterances {
                pass.absorb(id, self.process(id));
            }
            return Ok(pass);
        }

        let chunk_size = utterances.len().div_ceil(workers);
        let partials = std::thread::scope(|s| {
            let handles: Vec<_> = utterances
                .chunks(chunk_size)
                .map(|chunk| {
                    s.spawn(move || {
                        let mut pass = PassOne::default();
                        for id in chunk {
                            pass.absorb(id, self.process(id));
                        }
                        pass
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| anyhow!("Feature worker panicked")))
                .collect::<Result<Vec<_>>>()
        })?;

        // Chunks are merged in input order so the pre-shuffle manifest order
        // matches the sequential pass.
        let mut pass = PassOne::default();
        for partial in partials {
            pass.merge(partial);
        }
        Ok(pass)
    }

    pub fn build_from_path(&self) -> Result<CorpusSummary> {
        let store = self.builder.store();
        store.init()?;
        let writer = DatasetWriter::new(&self.config.path.filelist_path)?;

        let (speakers, utterances) = self.scan()?;
        log::info!(
            "Processing {} utterances from {} speakers ({} worker(s))",
            utterances.len(),
            speakers.len(),
            self.config.workers
        );

        let pass = self.feature_pass(&utterances)?;
        log::info!(
            "Feature pass done: {} built, {} discarded, {} failed",
            pass.report.built,
            pass.report.discarded_total(),
            pass.report.failed.len()
        );

        log::info!("Computing statistic quantities ...");
        let p = &self.config.preprocessing;
        let (pitch_mean, pitch_std) = scaling(&p.pitch, &pass.pitch);
        let (energy_mean, energy_std) = scaling(&p.energy, &pass.energy);
        let pitch = normalize(store, Quantity::Pitch, &pass.built, pitch_mean, pitch_std)?;
        let energy = normalize(store, Quantity::Energy, &pass.built, energy_mean, energy_std)?;
        let stats = CorpusStats { pitch, energy };
        log_stats("pitch", &pitch);
        log_stats("energy", &energy);

        writer.write_speakers(&speakers)?;
        writer.write_stats(&stats)?;

        let hours = pass.n_frames as f64 * self.config.hop_length() as f64
            / self.config.sampling_rate() as f64
            / 3600.0;
        log::info!("Total time: {:.4} hours", hours);

        let mut entries = pass.entries;
        let (n_train, n_val) = writer
            .write_split(&mut entries, p.val_size, self.config.seed)
            .context("Failed to write manifests")?;
        log::info!(
            "Wrote {} training and {} validation entries to {}",
            n_train,
            n_val,
            writer.dir().display()
        );

        Ok(CorpusSummary {
            report: pass.report,
            stats,
            speakers,
            entries,
            n_train,
            n_val,
            total_frames: pass.n_frames,
            hours,
        })
    }
}

/// Mean/std to apply for one quantity: the accumulated values, or an
/// identity transform when normalization is off.
fn scaling(config: &QuantityConfig, acc: &StreamingStats) -> (f64, f64) {
    if config.normalization {
        (acc.mean(), acc.std())
    } else {
        (0.0, 1.0)
    }
}

fn log_stats(name: &str, s: &QuantityStats) {
    log::info!(
        "{}: mean {:.4}, std {:.4}, normalized range [{:.4}, {:.4}]",
        name,
        s.mean,
        s.std,
        s.min,
        s.max
    );
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscardReason;

    #[test]
    fn test_report_merge_and_totals() {
        let a_id = UtteranceId::new("s", "a");
        let mut a = BatchReport::default();
        a.record(&a_id, &UtteranceOutcome::Discarded(DiscardReason::MissingAlignment));
        a.record(&a_id, &UtteranceOutcome::Failed(anyhow!("bad wav")));

        let mut b = BatchReport::default();
        b.record(&a_id, &UtteranceOutcome::Discarded(DiscardReason::MissingAlignment));
        b.record(&a_id, &UtteranceOutcome::Discarded(DiscardReason::InsufficientVoicing { voiced: 0 }));

        a.merge(b);
        assert_eq!(a.discarded["missing_alignment"], 2);
        assert_eq!(a.discarded["insufficient_voicing"], 1);
        assert_eq!(a.discarded_total(), 3);
        assert_eq!(a.failed.len(), 1);
        assert_eq!(a.failed[0].1, "bad wav");
        assert_eq!(a.total(), 4);
    }

    #[test]
    fn test_scaling_respects_normalization_switch() {
        let mut acc = StreamingStats::new();
        acc.update(&[100.0, 105.0, 98.0, 102.0]);
        let on = QuantityConfig { normalization: true, ..QuantityConfig::default() };
        let off = QuantityConfig { normalization: false, ..QuantityConfig::default() };

        let (mean, std) = scaling(&on, &acc);
        assert!((mean - 101.25).abs() < 1e-12);
        assert!((std - 6.6875f64.sqrt()).abs() < 1e-12);
        assert_eq!(scaling(&off, &acc), (0.0, 1.0));
    }

    #[test]
    fn test_scan_sorts_speakers_and_filters_wavs() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw");
        for (spk, files) in [("bob", &["2.wav", "1.wav", "1.lab"][..]), ("alice", &["x.WAV"][..])] {
            std::fs::create_dir_all(raw.join(spk)).unwrap();
            for f in files {
                std::fs::write(raw.join(spk).join(f), b"").unwrap();
            }
        }
        std::fs::write(raw.join("README"), b"").unwrap();

        let mut config = PreprocessConfig::default();
        config.path.raw_path = raw;
        config.path.preprocessed_path = dir.path().join("pre");
        let pre = Preprocessor::from_config(config).unwrap();
        let (speakers, utts) = pre.scan().unwrap();

        assert_eq!(speakers["alice"], 0);
        assert_eq!(speakers["bob"], 1);
        assert_eq!(
            utts,
            vec![
                UtteranceId::new("alice", "x"),
                UtteranceId::new("bob", "1"),
                UtteranceId::new("bob", "2"),
            ]
        );
    }
}
