//! Per-utterance feature storage.
//!
//! Each quantity lives in its own sub-directory of the output root, one
//! JSON file per utterance named `<speaker>-<quantity>-<basename>.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::types::UtteranceFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Duration,
    Pitch,
    Energy,
    Mel,
}

impl Quantity {
    pub const ALL: [Quantity; 4] = [Quantity::Duration, Quantity::Pitch, Quantity::Energy, Quantity::Mel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Duration => "duration",
            Quantity::Pitch => "pitch",
            Quantity::Energy => "energy",
            Quantity::Mel => "mel",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically write data to a file via temp file + rename.
fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = target.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, target)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FeatureStore {
    root: PathBuf,
}

impl FeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-quantity directories.
    pub fn init(&self) -> Result<()> {
        for q in Quantity::ALL {
            let dir = self.root.join(q.as_str());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// `<speaker>-<quantity>-<basename>`
    pub fn key(speaker: &str, quantity: Quantity, basename: &str) -> String {
        format!("{}-{}-{}", speaker, quantity, basename)
    }

    pub fn path(&self, speaker: &str, quantity: Quantity, basename: &str) -> PathBuf {
        self.root
            .join(quantity.as_str())
            .join(format!("{}.json", Self::key(speaker, quantity, basename)))
    }

    fn save<T: Serialize + ?Sized>(&self, speaker: &str, quantity: Quantity, basename: &str, value: &T) -> Result<()> {
        let path = self.path(speaker, quantity, basename);
        let json = serde_json::to_vec(value)?;
        atomic_write(&path, &json).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn load<T: DeserializeOwned>(&self, speaker: &str, quantity: Quantity, basename: &str) -> Result<T> {
        let path = self.path(speaker, quantity, basename);
        let data = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("Corrupt feature file {}", path.display()))
    }

    /// Persist duration, pitch, energy and mel for one utterance.
    pub fn save_features(&self, features: &UtteranceFeatures) -> Result<()> {
        let (spk, base) = (features.speaker.as_str(), features.basename.as_str());
        self.save(spk, Quantity::Duration, base, &features.durations)?;
        self.save(spk, Quantity::Pitch, base, &features.pitch)?;
        self.save(spk, Quantity::Energy, base, &features.energy)?;
        self.save(spk, Quantity::Mel, base, &features.mel)?;
        Ok(())
    }

    pub fn save_series(&self, speaker: &str, quantity: Quantity, basename: &str, values: &[f64]) -> Result<()> {
        self.save(speaker, quantity, basename, values)
    }

    pub fn load_series(&self, speaker: &str, quantity: Quantity, basename: &str) -> Result<Vec<f64>> {
        self.load(speaker, quantity, basename)
    }

    pub fn load_durations(&self, speaker: &str, basename: &str) -> Result<Vec<usize>> {
        self.load(speaker, Quantity::Duration, basename)
    }

    pub fn load_mel(&self, speaker: &str, basename: &str) -> Result<Vec<Vec<f32>>> {
        self.load(speaker, Quantity::Mel, basename)
    }
}
