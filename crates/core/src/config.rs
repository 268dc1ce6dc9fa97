//! Preprocessing configuration, loaded from YAML or JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Resolution at which pitch/energy curves are stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureLevel {
    /// One value per phone (block mean over its frames)
    PhonemeLevel,
    /// One value per frame
    FrameLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathConfig {
    /// Raw corpus root (LJSpeech layout: metadata.csv + wavs/)
    pub corpus_path: PathBuf,
    /// Per-speaker wav/lab directories produced by prepare-align
    pub raw_path: PathBuf,
    /// Output root; TextGrids are read from `<preprocessed_path>/TextGrid`
    pub preprocessed_path: PathBuf,
    /// Where train.txt, val.txt, speakers.json and stats.json go
    pub filelist_path: PathBuf,
    /// LRS2 video root for dump-audio
    #[serde(default)]
    pub lrs2_root: Option<PathBuf>,
    /// Output root for dumped LRS2 audio
    #[serde(default)]
    pub lrs2_output: Option<PathBuf>,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("./corpus/LJSpeech-1.1"),
            raw_path: PathBuf::from("./raw_data/LJSpeech"),
            preprocessed_path: PathBuf::from("./preprocessed_data/LJSpeech"),
            filelist_path: PathBuf::from("./filelists/LJSpeech"),
            lrs2_root: None,
            lrs2_output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextConfig {
    pub text_cleaners: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            text_cleaners: vec!["basic_cleaners".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    pub sampling_rate: u32,
    pub max_wav_value: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 22050,
            max_wav_value: 32768.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StftConfig {
    pub filter_length: usize,
    pub hop_length: usize,
    pub win_length: usize,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            filter_length: 1024,
            hop_length: 256,
            win_length: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MelConfig {
    pub n_mel_channels: usize,
    pub mel_fmin: f64,
    pub mel_fmax: f64,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_mel_channels: 80,
            mel_fmin: 0.0,
            mel_fmax: 8000.0,
        }
    }
}

/// Resolution and normalization switch for one quantity (pitch or energy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuantityConfig {
    pub feature: FeatureLevel,
    pub normalization: bool,
}

impl Default for QuantityConfig {
    fn default() -> Self {
        Self {
            feature: FeatureLevel::PhonemeLevel,
            normalization: true,
        }
    }
}

impl QuantityConfig {
    pub fn phoneme_averaging(&self) -> bool {
        self.feature == FeatureLevel::PhonemeLevel
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub val_size: usize,
    pub text: TextConfig,
    pub audio: AudioConfig,
    pub stft: StftConfig,
    pub mel: MelConfig,
    pub pitch: QuantityConfig,
    pub energy: QuantityConfig,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            val_size: 512,
            text: TextConfig::default(),
            audio: AudioConfig::default(),
            stft: StftConfig::default(),
            mel: MelConfig::default(),
            pitch: QuantityConfig::default(),
            energy: QuantityConfig::default(),
        }
    }
}

/// Top-level preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessConfig {
    pub path: PathConfig,
    pub preprocessing: PreprocessingConfig,
    /// RNG seed for the train/val shuffle
    pub seed: Option<u64>,
    /// Worker threads for the feature pass
    pub workers: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            path: PathConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            seed: None,
            workers: 1,
        }
    }
}

impl PreprocessConfig {
    /// Load a config file, choosing the format from its extension
    /// (`.yaml`/`.yml` or `.json`).
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&data)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&data)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?,
            _ => bail!(
                "Unsupported config format '{}' (expected .yaml, .yml or .json)",
                path.display()
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.preprocessing;
        if p.audio.sampling_rate == 0 {
            bail!("sampling_rate must be positive");
        }
        if p.audio.max_wav_value <= 0.0 {
            bail!("max_wav_value must be positive");
        }
        if p.stft.hop_length == 0 || p.stft.filter_length == 0 || p.stft.win_length == 0 {
            bail!("STFT filter, window and hop lengths must be positive");
        }
        if p.stft.win_length > p.stft.filter_length {
            bail!(
                "win_length ({}) exceeds filter_length ({})",
                p.stft.win_length,
                p.stft.filter_length
            );
        }
        if p.mel.n_mel_channels == 0 {
            bail!("n_mel_channels must be positive");
        }
        if p.mel.mel_fmin < 0.0 || p.mel.mel_fmin >= p.mel.mel_fmax {
            bail!(
                "mel_fmin ({}) must be non-negative and below mel_fmax ({})",
                p.mel.mel_fmin,
                p.mel.mel_fmax
            );
        }
        let nyquist = p.audio.sampling_rate as f64 / 2.0;
        if p.mel.mel_fmax > nyquist {
            bail!("mel_fmax ({}) exceeds Nyquist ({})", p.mel.mel_fmax, nyquist);
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        Ok(())
    }

    pub fn sampling_rate(&self) -> u32 {
        self.preprocessing.audio.sampling_rate
    }

    pub fn hop_length(&self) -> usize {
        self.preprocessing.stft.hop_length
    }

    /// Directory holding `<speaker>/<basename>.TextGrid` alignments.
    pub fn textgrid_dir(&self) -> PathBuf {
        self.path.preprocessed_path.join("TextGrid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
path:
  corpus_path: "/data/LJSpeech-1.1"
  raw_path: "./raw_data/LJSpeech"
  preprocessed_path: "./preprocessed_data/LJSpeech"
  filelist_path: "./filelists/LJSpeech"
preprocessing:
  val_size: 100
  text:
    text_cleaners: ["basic_cleaners"]
  audio:
    sampling_rate: 16000
    max_wav_value: 32768.0
  stft:
    filter_length: 1024
    hop_length: 256
    win_length: 1024
  mel:
    n_mel_channels: 80
    mel_fmin: 0
    mel_fmax: 8000
  pitch:
    feature: "frame_level"
    normalization: true
  energy:
    feature: "phoneme_level"
    normalization: false
seed: 7
"#;

    #[test]
    fn test_default_is_valid() {
        let config = PreprocessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.preprocessing.val_size, 512);
        assert!(config.preprocessing.pitch.phoneme_averaging());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocess.yaml");
        std::fs::write(&path, YAML).unwrap();

        let config = PreprocessConfig::load(&path).unwrap();
        assert_eq!(config.sampling_rate(), 16000);
        assert_eq!(config.hop_length(), 256);
        assert_eq!(config.preprocessing.val_size, 100);
        assert_eq!(config.preprocessing.pitch.feature, FeatureLevel::FrameLevel);
        assert!(!config.preprocessing.energy.normalization);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.workers, 1);
        assert_eq!(
            config.textgrid_dir(),
            PathBuf::from("./preprocessed_data/LJSpeech/TextGrid")
        );
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preprocess.json");
        let json = serde_json::to_string(&PreprocessConfig::default()).unwrap();
        std::fs::write(&path, json).unwrap();
        let config = PreprocessConfig::load(&path).unwrap();
        assert_eq!(config, PreprocessConfig::default());
    }

    #[test]
    fn test_rejects_unknown_feature_level() {
        let bad = YAML.replace("\"frame_level\"", "\"utterance_level\"");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, bad).unwrap();
        assert!(PreprocessConfig::load(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert!(PreprocessConfig::load(&path).is_err());
    }

    #[test]
    fn test_validate_fmax_above_nyquist() {
        let mut config = PreprocessConfig::default();
        config.preprocessing.audio.sampling_rate = 8000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_window_longer_than_filter() {
        let mut config = PreprocessConfig::default();
        config.preprocessing.stft.win_length = 2048;
        assert!(config.validate().is_err());
    }
}
