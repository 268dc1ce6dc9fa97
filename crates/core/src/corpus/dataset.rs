//! Manifest shuffle/split and filelist outputs.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::types::{CorpusStats, ManifestEntry};

/// Speaker name to integer id.
pub type SpeakerMap = BTreeMap<String, usize>;

/// Shuffle the whole manifest once. `None` seeds from entropy.
pub fn shuffle_entries(entries: &mut [ManifestEntry], seed: Option<u64>) {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    entries.shuffle(&mut rng);
}

/// Split into `(train, val)`: the first `val_size` entries are validation.
pub fn split_entries(entries: &[ManifestEntry], val_size: usize) -> (&[ManifestEntry], &[ManifestEntry]) {
    let n_val = val_size.min(entries.len());
    let (val, train) = entries.split_at(n_val);
    (train, val)
}

pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let mut out = String::new();
    for e in entries {
        out.push_str(&e.to_line());
        out.push('\n');
    }
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create manifest: {}", path.display()))?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    contents
        .lines()
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, line)| {
            ManifestEntry::parse_line(line)
                .with_context(|| format!("{}:{}: malformed manifest line", path.display(), i + 1))
        })
        .collect()
}

/// Writes `train.txt`, `val.txt`, `speakers.json` and `stats.json` into
/// one filelist directory.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create filelist directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_speakers(&self, speakers: &SpeakerMap) -> Result<()> {
        let path = self.dir.join("speakers.json");
        std::fs::write(&path, serde_json::to_string(speakers)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn write_stats(&self, stats: &CorpusStats) -> Result<()> {
        let path = self.dir.join("stats.json");
        std::fs::write(&path, serde_json::to_string(stats)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Shuffle, split and write both manifests. Returns `(n_train, n_val)`.
    pub fn write_split(&self, entries: &mut [ManifestEntry], val_size: usize, seed: Option<u64>) -> Result<(usize, usize)> {
        shuffle_entries(entries, seed);
        let (train, val) = split_entries(entries, val_size);
        if val.len() < val_size {
            log::warn!(
                "Only {} utterances available, validation set has {} instead of {}",
                entries.len(),
                val.len(),
                val_size
            );
        }
        write_manifest(&self.dir.join("train.txt"), train)?;
        write_manifest(&self.dir.join("val.txt"), val)?;
        Ok((train.len(), val.len()))
    }
}
