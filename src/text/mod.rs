//! Post-processing of recognized text
//!
//! Cleans raw backend output and corrects near-miss words against a
//! reference vocabulary.

pub mod distance;
pub mod normalize;
pub mod vocabulary;

pub use distance::levenshtein;
pub use normalize::normalize;
pub use vocabulary::Vocabulary;
