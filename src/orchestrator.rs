//! Answers a question about an image with the text module, the vision
//! module, or whichever of the two actually produced something.

use crate::error::{ErrorKind, OcrError};
use crate::ocr::OcrProcessor;
use crate::router::{route, RoutingDecision};
use crate::vision::VisionService;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Answer when neither module produced anything
pub const UNABLE_TO_PROCESS: &str = "Unable to process the image.";

/// What one module returned for a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutput {
    Answer { text: String },
    Empty,
    Failed { kind: ErrorKind, message: String },
}

impl ModuleOutput {
    /// Blank text is `Empty`
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Answer {
                text: trimmed.to_string(),
            }
        }
    }

    pub fn from_result(result: Result<String, OcrError>) -> Self {
        match result {
            Ok(text) => Self::from_text(text),
            Err(e) => Self::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Answer { .. })
    }

    /// Human-readable form; failures are prefixed with the module name
    pub fn render(&self, module: RoutingDecision) -> String {
        match self {
            Self::Answer { text } => text.clone(),
            Self::Empty => String::new(),
            Self::Failed { message, .. } => {
                let prefix = match module {
                    RoutingDecision::TextModule => "OCR",
                    RoutingDecision::VisionModule => "VQA",
                };
                format!("{} Error: {}", prefix, message)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    /// Module that supplied `answer`, after fallback
    pub module: RoutingDecision,
    pub question: String,
    pub text_output: ModuleOutput,
    pub vision_output: ModuleOutput,
    /// Prompt actually sent to the vision module
    pub vision_question_used: String,
}

/// Vision prompt with the detected text appended when there is any
pub fn enrich_question(question: &str, text_output: &ModuleOutput) -> String {
    let question = question.trim();
    match text_output {
        ModuleOutput::Answer { text } => format!("{}\n\nDetected text in image: {}", question, text),
        _ => question.to_string(),
    }
}

/// Pick the answering module and its answer.
///
/// The routed module answers if its output is valid, otherwise the other
/// module does if its output is valid. With both invalid the routed module
/// is kept and the answer is the first non-empty rendering, primary first.
pub fn resolve(
    decision: RoutingDecision,
    text_output: &ModuleOutput,
    vision_output: &ModuleOutput,
) -> (RoutingDecision, String) {
    let output_of = |module: RoutingDecision| match module {
        RoutingDecision::TextModule => text_output,
        RoutingDecision::VisionModule => vision_output,
    };

    let primary = output_of(decision);
    if primary.is_valid() {
        return (decision, primary.render(decision));
    }

    let other = decision.other();
    let secondary = output_of(other);
    if secondary.is_valid() {
        tracing::info!(
            "Falling back from {} to {}",
            decision.as_str(),
            other.as_str()
        );
        return (other, secondary.render(other));
    }

    let answer = [primary.render(decision), secondary.render(other)]
        .into_iter()
        .find(|rendered| !rendered.is_empty())
        .unwrap_or_else(|| UNABLE_TO_PROCESS.to_string());
    (decision, answer)
}

/// Runs both modules for every request and routes between their outputs
pub struct Orchestrator {
    text: OcrProcessor,
    vision: Arc<VisionService>,
}

impl Orchestrator {
    pub fn new(text: OcrProcessor, vision: Arc<VisionService>) -> Self {
        Self { text, vision }
    }

    pub fn text_module(&self) -> &OcrProcessor {
        &self.text
    }

    pub fn vision_service(&self) -> &VisionService {
        &self.vision
    }

    /// Answer `question` about the image at `image_path`.
    ///
    /// Only a blank question is an error; module failures end up in the
    /// outputs and fallback routes around them.
    pub fn answer(&self, image_path: &Path, question: &str) -> Result<QueryResult, OcrError> {
        if question.trim().is_empty() {
            return Err(OcrError::Validation("No question provided".to_string()));
        }

        let decision = route(question);

        let text_output = match self.text.process(image_path) {
            Ok(extraction) => ModuleOutput::from_text(extraction.text),
            Err(e) => {
                tracing::warn!("Text module failed: {}", e);
                ModuleOutput::from_result(Err(e))
            }
        };

        let vision_question = enrich_question(question, &text_output);
        let vision_output =
            ModuleOutput::from_result(self.vision.answer(image_path, &vision_question));
        if let ModuleOutput::Failed { message, .. } = &vision_output {
            tracing::warn!("Vision module failed: {}", message);
        }

        let (module, answer) = resolve(decision, &text_output, &vision_output);
        tracing::info!(
            "Answered with {} (routed to {})",
            module.as_str(),
            decision.as_str()
        );

        Ok(QueryResult {
            answer,
            module,
            question: question.to_string(),
            text_output,
            vision_output,
            vision_question_used: vision_question,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{write_png, FixedBackend};
    use crate::text::Vocabulary;
    use crate::vision::{validate_request, VisionModel};
    use std::sync::Mutex;

    fn answer(text: &str) -> ModuleOutput {
        ModuleOutput::from_text(text)
    }

    fn failed(kind: ErrorKind, message: &str) -> ModuleOutput {
        ModuleOutput::Failed {
            kind,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_valid_primary_is_kept() {
        let (module, text) = resolve(
            RoutingDecision::TextModule,
            &answer("EXIT ONLY"),
            &answer("A green sign."),
        );
        assert_eq!(module, RoutingDecision::TextModule);
        assert_eq!(text, "EXIT ONLY");
    }

    #[test]
    fn test_empty_text_falls_back_to_vision() {
        let (module, text) = resolve(
            RoutingDecision::TextModule,
            &ModuleOutput::Empty,
            &answer("A dog on a leash."),
        );
        assert_eq!(module, RoutingDecision::VisionModule);
        assert_eq!(text, "A dog on a leash.");
    }

    #[test]
    fn test_failed_vision_falls_back_to_text() {
        let (module, text) = resolve(
            RoutingDecision::VisionModule,
            &answer("OPEN"),
            &failed(ErrorKind::BackendUnavailable, "no endpoint"),
        );
        assert_eq!(module, RoutingDecision::TextModule);
        assert_eq!(text, "OPEN");
    }

    #[test]
    fn test_both_invalid_prefers_primary_rendering() {
        let (module, text) = resolve(
            RoutingDecision::VisionModule,
            &ModuleOutput::Empty,
            &failed(ErrorKind::Processing, "HTTP 500"),
        );
        assert_eq!(module, RoutingDecision::VisionModule);
        assert_eq!(text, "VQA Error: HTTP 500");

        let (_, text) = resolve(
            RoutingDecision::VisionModule,
            &failed(ErrorKind::ImageLoad, "corrupt"),
            &ModuleOutput::Empty,
        );
        assert_eq!(text, "OCR Error: corrupt");
    }

    #[test]
    fn test_both_empty_is_unable_to_process() {
        let (module, text) = resolve(
            RoutingDecision::TextModule,
            &ModuleOutput::Empty,
            &ModuleOutput::Empty,
        );
        assert_eq!(module, RoutingDecision::TextModule);
        assert_eq!(text, UNABLE_TO_PROCESS);
    }

    #[test]
    fn test_blank_text_is_empty() {
        assert_eq!(ModuleOutput::from_text("  \n"), ModuleOutput::Empty);
        assert!(!ModuleOutput::from_text("").is_valid());
    }

    #[test]
    fn test_enrichment_only_with_detected_text() {
        assert_eq!(
            enrich_question(" What is this? ", &answer("NO PARKING")),
            "What is this?\n\nDetected text in image: NO PARKING"
        );
        assert_eq!(enrich_question("What is this?", &ModuleOutput::Empty), "What is this?");
        assert_eq!(
            enrich_question("What is this?", &failed(ErrorKind::Recognition, "x")),
            "What is this?"
        );
    }

    /// Records the prompts it receives
    struct RecordingModel {
        reply: String,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl VisionModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        fn answer(&self, image_path: &Path, question: &str) -> Result<String, OcrError> {
            validate_request(image_path, question)?;
            self.prompts.lock().unwrap().push(question.to_string());
            Ok(self.reply.clone())
        }
    }

    fn orchestrator(backend: FixedBackend, reply: &str) -> (Orchestrator, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&prompts);
        let reply = reply.to_string();
        let vision = VisionService::new(move || {
            Ok(Arc::new(RecordingModel {
                reply: reply.clone(),
                prompts: Arc::clone(&recorded),
            }) as Arc<dyn VisionModel>)
        });
        let text = OcrProcessor::from_config(
            &Config::default(),
            Arc::new(backend),
            Arc::new(Vocabulary::builtin()),
        );
        (Orchestrator::new(text, Arc::new(vision)), prompts)
    }

    #[test]
    fn test_blank_question_is_rejected() {
        let (orchestrator, _) = orchestrator(FixedBackend::new(&[]), "anything");
        let result = orchestrator.answer(Path::new("/tmp/x.png"), "   ");
        assert!(matches!(result, Err(OcrError::Validation(_))));
    }

    #[test]
    fn test_text_question_answered_by_text_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign.png");
        write_png(&path);

        let (orchestrator, prompts) =
            orchestrator(FixedBackend::new(&[("N0", 90.0), ("PARKING", 90.0)]), "A sign.");
        let result = orchestrator.answer(&path, "What does the sign say?").unwrap();

        assert_eq!(result.module, RoutingDecision::TextModule);
        assert_eq!(result.answer, "NO PARKING");
        assert_eq!(result.vision_output, answer("A sign."));
        assert_eq!(
            *prompts.lock().unwrap(),
            vec!["What does the sign say?\n\nDetected text in image: NO PARKING".to_string()]
        );
    }

    #[test]
    fn test_text_question_without_text_uses_vision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        write_png(&path);

        let (orchestrator, _) = orchestrator(FixedBackend::new(&[]), "A blank wall.");
        let result = orchestrator.answer(&path, "Read the text on this sign").unwrap();

        assert_eq!(result.text_output, ModuleOutput::Empty);
        assert_eq!(result.module, RoutingDecision::VisionModule);
        assert_eq!(result.answer, "A blank wall.");
        assert_eq!(result.vision_question_used, "Read the text on this sign");
    }

    #[test]
    fn test_missing_image_fails_both_modules() {
        let (orchestrator, _) = orchestrator(FixedBackend::new(&[("EXIT", 90.0)]), "unused");
        let result = orchestrator
            .answer(Path::new("/no/such/file.png"), "What color is the door?")
            .unwrap();

        assert!(matches!(
            result.text_output,
            ModuleOutput::Failed {
                kind: ErrorKind::ImageLoad,
                ..
            }
        ));
        assert!(result.answer.starts_with("VQA Error:"));
    }
}
