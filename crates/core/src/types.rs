use serde::{Deserialize, Serialize};

/// A single labelled interval from a forced-alignment tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Phone label (e.g. "AH0", or a silence marker like "sil")
    pub label: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, label: &str) -> Self {
        Self {
            start,
            end,
            label: label.to_string(),
        }
    }
}

/// Speaker directory plus file stem, the key of every per-utterance file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId {
    pub speaker: String,
    pub basename: String,
}

impl UtteranceId {
    pub fn new(speaker: &str, basename: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            basename: basename.to_string(),
        }
    }
}

impl std::fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.speaker, self.basename)
    }
}

/// Phone sequence with per-phone frame durations, trimmed of leading and
/// trailing silence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhoneAlignment {
    pub phones: Vec<String>,
    /// Duration of each phone in frames
    pub durations: Vec<usize>,
    /// Start of the first non-silence phone (seconds)
    pub start_time: f64,
    /// End of the last non-silence phone (seconds)
    pub end_time: f64,
}

impl PhoneAlignment {
    /// Total number of frames covered by the phone sequence.
    pub fn total_frames(&self) -> usize {
        self.durations.iter().sum()
    }

    /// A span is usable only if it is strictly positive.
    pub fn is_degenerate(&self) -> bool {
        self.start_time >= self.end_time
    }
}

/// Phone sequence in the `{p1 p2 ...}` form used by manifests.
pub fn bracketed_phones(phones: &[String]) -> String {
    format!("{{{}}}", phones.join(" "))
}

/// Feature arrays built for one utterance.
#[derive(Debug, Clone)]
pub struct UtteranceFeatures {
    pub speaker: String,
    pub basename: String,
    pub phones: Vec<String>,
    pub durations: Vec<usize>,
    /// Frame- or phone-resolution F0 curve
    pub pitch: Vec<f64>,
    /// Frame- or phone-resolution energy curve
    pub energy: Vec<f64>,
    /// Mel-spectrogram, time-major (frames x mel bins)
    pub mel: Vec<Vec<f32>>,
    pub raw_text: String,
}

impl UtteranceFeatures {
    pub fn mel_frames(&self) -> usize {
        self.mel.len()
    }

    pub fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            basename: self.basename.clone(),
            speaker: self.speaker.clone(),
            text: bracketed_phones(&self.phones),
            raw_text: self.raw_text.clone(),
        }
    }
}

/// One line of `train.txt` / `val.txt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub basename: String,
    pub speaker: String,
    /// Bracketed phone string, e.g. `{HH AH0 L OW1}`
    pub text: String,
    pub raw_text: String,
}

impl ManifestEntry {
    /// `basename|speaker|{phones}|raw_text`
    pub fn to_line(&self) -> String {
        [
            self.basename.as_str(),
            self.speaker.as_str(),
            self.text.as_str(),
            self.raw_text.as_str(),
        ]
        .join("|")
    }

    /// Parse a manifest line. The raw text may itself contain `|`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(4, '|');
        Some(Self {
            basename: parts.next()?.to_string(),
            speaker: parts.next()?.to_string(),
            text: parts.next()?.to_string(),
            raw_text: parts.next()?.to_string(),
        })
    }
}

/// Final statistics for one normalized quantity.
///
/// Serialized as `[min, max, mean, std]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct QuantityStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl From<[f64; 4]> for QuantityStats {
    fn from(v: [f64; 4]) -> Self {
        Self {
            min: v[0],
            max: v[1],
            mean: v[2],
            std: v[3],
        }
    }
}

impl From<QuantityStats> for [f64; 4] {
    fn from(s: QuantityStats) -> Self {
        [s.min, s.max, s.mean, s.std]
    }
}

/// Contents of `stats.json`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CorpusStats {
    pub pitch: QuantityStats,
    pub energy: QuantityStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_totals() {
        let a = PhoneAlignment {
            phones: vec!["k".into(), "sp".into(), "ae".into()],
            durations: vec![13, 0, 19],
            start_time: 0.1,
            end_time: 0.6,
        };
        assert_eq!(a.total_frames(), 32);
        assert_eq!(bracketed_phones(&a.phones), "{k sp ae}");
        assert!(!a.is_degenerate());
    }

    #[test]
    fn test_degenerate_span() {
        let a = PhoneAlignment {
            phones: vec![],
            durations: vec![],
            start_time: 0.0,
            end_time: 0.0,
        };
        assert!(a.is_degenerate());
    }

    #[test]
    fn test_manifest_line() {
        let e = ManifestEntry {
            basename: "LJ001-0001".into(),
            speaker: "LJSpeech".into(),
            text: "{HH AH0}".into(),
            raw_text: "ha".into(),
        };
        assert_eq!(e.to_line(), "LJ001-0001|LJSpeech|{HH AH0}|ha");
    }

    #[test]
    fn test_manifest_parse_keeps_pipes_in_raw_text() {
        let e = ManifestEntry::parse_line("a|b|{x}|one|two").unwrap();
        assert_eq!(e.basename, "a");
        assert_eq!(e.raw_text, "one|two");
        assert!(ManifestEntry::parse_line("a|b").is_none());
    }

    #[test]
    fn test_stats_serialize_as_arrays() {
        let stats = CorpusStats {
            pitch: QuantityStats { min: -1.5, max: 2.0, mean: 120.0, std: 30.0 },
            energy: QuantityStats { min: -1.0, max: 3.0, mean: 0.0, std: 1.0 },
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["pitch"], serde_json::json!([-1.5, 2.0, 120.0, 30.0]));
        let back: CorpusStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }

    #[test]
    fn test_features_manifest_entry() {
        let f = UtteranceFeatures {
            speaker: "spk".into(),
            basename: "utt".into(),
            phones: vec!["a".into(), "b".into()],
            durations: vec![1, 2],
            pitch: vec![0.0; 2],
            energy: vec![0.0; 2],
            mel: vec![vec![0.0; 4]; 3],
            raw_text: "ab".into(),
        };
        assert_eq!(f.mel_frames(), 3);
        assert_eq!(f.manifest_entry().to_line(), "utt|spk|{a b}|ab");
    }
}
