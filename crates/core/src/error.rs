//! Per-utterance outcome types.

use thiserror::Error;

use crate::types::UtteranceFeatures;

/// Why an utterance was left out of the corpus. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscardReason {
    #[error("no alignment file")]
    MissingAlignment,
    #[error("degenerate alignment span ({start:.3}s >= {end:.3}s)")]
    DegenerateAlignment { start: f64, end: f64 },
    #[error("insufficient voicing ({voiced} voiced frame(s))")]
    InsufficientVoicing { voiced: usize },
}

impl DiscardReason {
    /// Short stable name used for report bucketing.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscardReason::MissingAlignment => "missing_alignment",
            DiscardReason::DegenerateAlignment { .. } => "degenerate_alignment",
            DiscardReason::InsufficientVoicing { .. } => "insufficient_voicing",
        }
    }
}

/// What the corpus pass keeps from a successfully built utterance.
#[derive(Debug, Clone)]
pub struct BuiltUtterance {
    pub features: UtteranceFeatures,
    /// Outlier-filtered pitch values, only for corpus statistics
    pub pitch_filtered: Vec<f64>,
    /// Outlier-filtered energy values, only for corpus statistics
    pub energy_filtered: Vec<f64>,
    /// Mel frame count, for duration accounting
    pub n_frames: usize,
}

/// Result of processing one utterance.
#[derive(Debug)]
pub enum UtteranceOutcome {
    Built(Box<BuiltUtterance>),
    Discarded(DiscardReason),
    Failed(anyhow::Error),
}

impl From<anyhow::Result<Result<BuiltUtterance, DiscardReason>>> for UtteranceOutcome {
    fn from(r: anyhow::Result<Result<BuiltUtterance, DiscardReason>>) -> Self {
        match r {
            Ok(Ok(built)) => UtteranceOutcome::Built(Box::new(built)),
            Ok(Err(reason)) => UtteranceOutcome::Discarded(reason),
            Err(e) => UtteranceOutcome::Failed(e),
        }
    }
}
