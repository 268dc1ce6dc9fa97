//! Corpus-level passes: preparation, feature extraction, normalization and
//! dataset output.

pub mod dataset;
pub mod normalize;
pub mod pipeline;
pub mod prepare;

pub use dataset::{DatasetWriter, SpeakerMap};
pub use pipeline::{BatchReport, CorpusSummary, Preprocessor};
pub use prepare::{dump_audio, prepare_align};
