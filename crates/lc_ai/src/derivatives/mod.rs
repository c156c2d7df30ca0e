//! LLM-generated variations of dataset questions, stored next to the originals.

use std::collections::BTreeSet;

use lc_core::domain::{tags, ContentType, IndexEntry, Metadata, MetaValue};
use lc_core::error::AppError;
use lc_core::prepare::PreparedDocuments;
use serde::{Deserialize, Serialize};

use crate::index::{IndexStore, TagFilter};
use crate::llm::{extract_json_block, Llm};

mod prompts;

/// A dataset question used as the starting point for variations.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeSeed {
    pub original_id: String,
    pub part: u8,
    pub context: String,
    pub question: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variation {
    pub text: String,
    pub question: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivativeReport {
    pub seeds: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub added: usize,
}

#[derive(Debug, Deserialize)]
struct VariationsReply {
    variations: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVariation {
    text: Option<String>,
    question: Option<String>,
    answers: Option<Vec<RawAnswer>>,
    is_true: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawAnswer {
    option: Option<String>,
    text: Option<String>,
    correct: Option<bool>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn validate_variation(part: u8, raw: RawVariation) -> Option<Variation> {
    let text = collapse_whitespace(raw.text.as_deref()?);
    let question = collapse_whitespace(raw.question.as_deref()?);
    if text.is_empty() || question.is_empty() {
        return None;
    }
    let correct_answer = if part == 2 {
        let verdict = if raw.is_true? { "Richtig" } else { "Falsch" };
        verdict.to_string()
    } else {
        let answers = raw.answers?;
        let complete = answers.len() == 3
            && answers.iter().all(|a| {
                a.correct.is_some()
                    && a.option.as_deref().is_some_and(|o| !o.trim().is_empty())
                    && a.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            });
        let mut correct = answers.iter().filter(|a| a.correct == Some(true));
        match (complete, correct.next(), correct.next()) {
            (true, Some(answer), None) => answer.text.clone()?,
            _ => return None,
        }
    };
    // Dialogues read one speaker turn per line.
    let text = if part == 1 {
        text.replace(" - ", "\n- ")
    } else {
        text
    };
    Some(Variation {
        text,
        question,
        correct_answer,
    })
}

/// Ask the model for `n` variations of `seed`. Variations failing validation are dropped.
pub fn generate_variations(
    llm: &dyn Llm,
    model: &str,
    seed: &DerivativeSeed,
    n: usize,
) -> Result<Vec<Variation>, AppError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let prompt = prompts::variations_prompt(seed.part, &seed.context, &seed.question, n);
    let raw = llm.generate(model, &prompt)?;
    let json = collapse_whitespace(extract_json_block(&raw));

    let reply: VariationsReply = serde_json::from_str(&json).map_err(|e| {
        AppError::new(
            "GENERATION_INVALID_RESPONSE",
            "Model reply is not a variations object",
        )
        .with_details(format!("original_id={}; err={}", seed.original_id, e))
    })?;

    // Each variation is decoded on its own so one malformed entry does not sink the reply.
    let total = reply.variations.len();
    let valid: Vec<Variation> = reply
        .variations
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawVariation>(v).ok())
        .filter_map(|v| validate_variation(seed.part, v))
        .collect();
    if valid.len() < total {
        tracing::warn!(
            original_id = %seed.original_id,
            dropped = total - valid.len(),
            "dropped invalid variations"
        );
    }
    Ok(valid)
}

fn question_for<'a>(content: &IndexEntry, questions: &'a [IndexEntry]) -> Option<&'a IndexEntry> {
    questions
        .iter()
        .find(|q| q.part() == content.part() && q.question_number() == content.question_number())
}

/// Original dataset questions currently in the index, in insertion order.
pub fn seeds_from_index(index: &IndexStore) -> Result<Vec<DerivativeSeed>, AppError> {
    let originals = index.get(&TagFilter::new().eq(tags::IS_DERIVATIVE, false))?;
    let (contents, questions): (Vec<IndexEntry>, Vec<IndexEntry>) = originals
        .into_iter()
        .filter(|e| e.content_type() != Some(ContentType::Instruction))
        .partition(|e| e.content_type() == Some(ContentType::DialogueOrStatement));

    let mut seeds = Vec::new();
    for content in contents.iter() {
        let (Some(part), Some(q)) = (content.part(), question_for(content, &questions)) else {
            continue;
        };
        let mut metadata = content.metadata.clone();
        if let Some(answer) = q.metadata.get(tags::CORRECT_ANSWER) {
            metadata.insert(tags::CORRECT_ANSWER.into(), answer.clone());
        }
        seeds.push(DerivativeSeed {
            original_id: content.id.clone(),
            part,
            context: content.document.clone(),
            question: q.document.clone(),
            metadata,
        });
    }
    Ok(seeds)
}

/// Generate variations for every original question that has none yet and append them
/// in one batch. Backend failures abort; unusable model replies only skip that seed.
pub fn add_derivatives(
    index: &IndexStore,
    llm: &dyn Llm,
    model: &str,
    variations_per_question: usize,
) -> Result<DerivativeReport, AppError> {
    let seeds = seeds_from_index(index)?;
    let existing: BTreeSet<String> = index
        .get(&TagFilter::new().eq(tags::IS_DERIVATIVE, true))?
        .into_iter()
        .filter_map(|e| {
            e.metadata
                .get(tags::ORIGINAL_ID)
                .and_then(MetaValue::as_str)
                .map(str::to_string)
        })
        .collect();

    let mut report = DerivativeReport {
        seeds: seeds.len(),
        ..DerivativeReport::default()
    };
    let mut batch = PreparedDocuments::default();

    for seed in seeds.iter() {
        if existing.contains(&seed.original_id) {
            report.skipped_existing += 1;
            continue;
        }
        let variations = match generate_variations(llm, model, seed, variations_per_question) {
            Ok(v) => v,
            Err(e) if e.code == "GENERATION_INVALID_RESPONSE" => {
                tracing::warn!(original_id = %seed.original_id, error = %e, "skipping seed");
                report.failed += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        for (k, v) in variations.into_iter().enumerate() {
            let mut metadata = seed.metadata.clone();
            metadata.insert(tags::CONTENT_TYPE.into(), ContentType::DialogueOrStatement.into());
            metadata.insert(tags::IS_DERIVATIVE.into(), true.into());
            metadata.insert(tags::ORIGINAL_ID.into(), seed.original_id.clone().into());
            metadata.insert(tags::CORRECT_ANSWER.into(), v.correct_answer.into());
            batch.ids.push(format!("{}_derivative_{k}", seed.original_id));
            batch.documents.push(format!("{}\n{}", v.text, v.question));
            batch.metadatas.push(metadata);
        }
    }

    report.added = index.add_batch(&batch)?;
    tracing::info!(
        seeds = report.seeds,
        added = report.added,
        skipped = report.skipped_existing,
        failed = report.failed,
        "derivative questions added"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str, question: &str) -> RawVariation {
        RawVariation {
            text: Some(text.to_string()),
            question: Some(question.to_string()),
            ..RawVariation::default()
        }
    }

    fn answer(option: &str, text: &str, correct: bool) -> RawAnswer {
        RawAnswer {
            option: Some(option.to_string()),
            text: Some(text.to_string()),
            correct: Some(correct),
        }
    }

    #[test]
    fn part_one_dialogue_gets_one_turn_per_line() {
        let mut r = raw("- Hallo!   - Guten Tag.", "Wer spricht?");
        r.answers = Some(vec![answer("A", "Zwei", true), answer("B", "Drei", false), answer("C", "Vier", false)]);
        let v = validate_variation(1, r).expect("valid");
        assert_eq!(v.text, "- Hallo!\n- Guten Tag.");
        assert_eq!(v.correct_answer, "Zwei");
    }

    #[test]
    fn part_two_requires_truth_value() {
        assert!(validate_variation(2, raw("Durchsage", "Es regnet.")).is_none());
        let mut r = raw("Durchsage", "Es regnet.");
        r.is_true = Some(true);
        assert_eq!(validate_variation(2, r).expect("valid").correct_answer, "Richtig");
    }

    #[test]
    fn answer_without_correct_flag_drops_the_variation() {
        let mut r = raw("- Hallo! - Tag.", "Wer?");
        let mut unflagged = answer("C", "Vier", false);
        unflagged.correct = None;
        r.answers = Some(vec![answer("A", "Zwei", true), answer("B", "Drei", false), unflagged]);
        assert!(validate_variation(1, r).is_none());
    }

    #[test]
    fn multiple_choice_without_answers_is_dropped() {
        assert!(validate_variation(3, raw("Nachricht", "Wann?")).is_none());
    }
}
