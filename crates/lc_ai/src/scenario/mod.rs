//! Fresh practice exams generated from the dataset questions of one topic.

use lc_core::dataset::parse_dataset;
use lc_core::domain::{ExamDataset, QuestionBody};
use lc_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::index::IndexStore;
use crate::llm::{extract_json_block, Llm};
use crate::topics::questions_for_topic;

mod prompts;

/// One practice question: the text to listen to, what is asked and the choices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub part: u8,
    pub dialogue: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

pub struct ScenarioGenerator<'a> {
    llm: &'a dyn Llm,
    model: String,
}

impl<'a> ScenarioGenerator<'a> {
    pub fn new(llm: &'a dyn Llm, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Three scenarios, one per exam part, in part order.
    pub fn generate(&self, index: &IndexStore, topic: &str) -> Result<Vec<Scenario>, AppError> {
        let examples = questions_for_topic(index, topic)?;
        if examples.is_empty() {
            return Err(AppError::new(
                "GENERATION_NO_EXAMPLES",
                "No dataset questions found for this topic",
            )
            .with_details(format!("topic={}", topic.trim())));
        }

        let examples_json = serde_json::to_string_pretty(&examples).map_err(|e| {
            AppError::new("GENERATION_PROMPT_FAILED", "Failed to serialize topic examples")
                .with_details(e.to_string())
        })?;
        let prompt = prompts::scenario_prompt(topic.trim(), &examples_json);
        let raw = self.llm.generate(&self.model, &prompt)?;

        let dataset = parse_dataset(extract_json_block(&raw)).map_err(|e| {
            AppError::new(
                "GENERATION_INVALID_RESPONSE",
                "Generated exam did not pass dataset validation",
            )
            .with_details(format!("{}: {}", e.code, e.details.unwrap_or(e.message)))
        })?;

        let scenarios = scenarios_from_dataset(&dataset);
        if scenarios.len() != 3 {
            return Err(AppError::new(
                "GENERATION_INVALID_RESPONSE",
                "Generated exam must contain exactly one question per part",
            )
            .with_details(format!("scenarios={}", scenarios.len())));
        }
        tracing::info!(topic = topic.trim(), examples = examples.len(), "scenario generated");
        Ok(scenarios)
    }
}

/// First question of each part; parts come back sorted by number.
pub fn scenarios_from_dataset(dataset: &ExamDataset) -> Vec<Scenario> {
    let mut out: Vec<Scenario> = dataset
        .parts
        .iter()
        .filter_map(|part| {
            let q = part.questions.first()?;
            let (question, options, correct_index) = match &q.body {
                QuestionBody::MultipleChoice {
                    exam_question,
                    answers,
                } => (
                    exam_question.clone(),
                    answers.iter().map(|a| a.text.clone()).collect(),
                    answers.iter().position(|a| a.correct)?,
                ),
                QuestionBody::TrueFalse {
                    exam_statement,
                    is_true,
                } => (
                    exam_statement.clone(),
                    vec!["Richtig".to_string(), "Falsch".to_string()],
                    if *is_true { 0 } else { 1 },
                ),
            };
            Some(Scenario {
                part: part.part_number,
                dialogue: q.text.clone(),
                question,
                options,
                correct_index,
            })
        })
        .collect();
    out.sort_by_key(|s| s.part);
    out
}
