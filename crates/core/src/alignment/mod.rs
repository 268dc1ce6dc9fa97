//! Forced-alignment input: TextGrid reading and phone trimming.

pub mod phones;
pub mod textgrid;

pub use phones::{SILENCE_PHONES, get_alignment, load_alignment};
