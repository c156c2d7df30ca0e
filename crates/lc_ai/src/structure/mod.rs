//! Exam datasets extracted from raw listening-test transcripts.

use lc_core::dataset::parse_dataset;
use lc_core::domain::ExamDataset;
use lc_core::error::AppError;

use crate::llm::{extract_json_block, Llm};

mod prompts;

pub struct TranscriptStructurer<'a> {
    llm: &'a dyn Llm,
    model: String,
}

impl<'a> TranscriptStructurer<'a> {
    pub fn new(llm: &'a dyn Llm, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Ask the model to structure `transcript` and validate the reply as a dataset.
    /// A bare array of parts is accepted as well as a `{"parts": [...]}` object.
    pub fn structure(&self, transcript: &str) -> Result<ExamDataset, AppError> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(AppError::new(
                "GENERATION_EMPTY_TRANSCRIPT",
                "Transcript must not be empty",
            ));
        }

        let raw = self.llm.generate(&self.model, &prompts::structure_prompt(transcript))?;
        let json = extract_json_block(&raw);
        let json = if json.starts_with('[') {
            format!(r#"{{"parts": {json}}}"#)
        } else {
            json.to_string()
        };

        let dataset = parse_dataset(&json).map_err(|e| {
            AppError::new(
                "GENERATION_INVALID_RESPONSE",
                "Structured transcript did not pass dataset validation",
            )
            .with_details(format!("{}: {}", e.code, e.details.unwrap_or(e.message)))
        })?;
        if dataset.question_count() == 0 {
            return Err(AppError::new(
                "GENERATION_INVALID_RESPONSE",
                "Structured transcript contains no questions",
            ));
        }

        tracing::info!(
            transcript_chars = transcript.chars().count(),
            parts = dataset.parts.len(),
            questions = dataset.question_count(),
            "transcript structured"
        );
        Ok(dataset)
    }
}
