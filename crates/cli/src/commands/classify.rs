use serde::Serialize;
use slotbot_core::config::LoadOptions;

use crate::commands::{load_runtime, serialize_payload, CommandResult, EXIT_RUNTIME_FAILURE};

#[derive(Debug, Serialize)]
struct ClassifyReport<'a> {
    command: &'static str,
    status: &'static str,
    text: &'a str,
    intent: &'a str,
    matched_phrase: Option<&'a str>,
    score: Option<f64>,
    fallback: bool,
    threshold: f64,
    matcher: &'static str,
}

pub fn run(options: LoadOptions, text: &str) -> CommandResult {
    let (_, runtime) = match load_runtime("classify", options) {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let engine = runtime.engine();
    let classifier = engine.classifier();
    let Some(classification) = classifier.classify(engine.catalog(), text) else {
        return CommandResult::failure(
            "classify",
            "fallback_missing",
            format!("fallback intent `{}` is not in the catalog", classifier.fallback_intent()),
            EXIT_RUNTIME_FAILURE,
        );
    };

    let report = ClassifyReport {
        command: "classify",
        status: "ok",
        text,
        intent: &classification.intent.name,
        matched_phrase: classification.matched_phrase,
        score: classification.score,
        fallback: classification.fallback,
        threshold: classifier.threshold(),
        matcher: classifier.matcher_name(),
    };

    CommandResult { exit_code: 0, output: serialize_payload(&report) }
}
