//! Image preprocessing for text recognition
//!
//! Normalizes decoded images into a grayscale working copy tuned for the
//! recognition backends.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, PreprocessingResult, Preset, StepTiming};
