//! Audio loading and the frame-rate DSP collaborators.

pub mod io;
pub mod pitch;
pub mod stft;

pub use pitch::{AutocorrelationTracker, PitchTracker};
pub use stft::{SpectralExtractor, Spectrogram, TacotronStft};
