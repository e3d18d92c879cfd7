//! Assistive visual question answering
//!
//! Answers a question about an image with either an OCR pipeline or a
//! vision-language model, picking the module from the wording of the
//! question and falling back to the other one when the first comes up empty.

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod ocr;
pub mod orchestrator;
pub mod preprocessing;
pub mod ranking;
pub mod recognition;
pub mod regions;
pub mod router;
pub mod server;
pub mod text;
pub mod vision;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use engine::{RecognitionBackend, SegmentationMode, TokenConfidence};
pub use error::{ErrorKind, OcrError};
pub use ocr::{OcrProcessor, TextExtraction, NO_TEXT_FOUND};
pub use orchestrator::{ModuleOutput, Orchestrator, QueryResult};
pub use router::{route, RoutingDecision};
pub use text::Vocabulary;
