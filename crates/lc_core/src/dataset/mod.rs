use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use time::OffsetDateTime;

use crate::domain::{Answer, ExamDataset, ExamPart, ExamQuestion, QuestionBody};
use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
struct RawDataset {
    parts: Option<Vec<RawPart>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPart {
    part: Option<i64>,
    introduction: Option<String>,
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAnswer {
    option: Option<String>,
    text: Option<String>,
    #[serde(default)]
    correct: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawQuestion {
    question_number: Option<i64>,
    text: Option<String>,
    topic: Option<String>,
    exam_question: Option<String>,
    answers: Option<Vec<RawAnswer>>,
    correct_option: Option<String>,
    exam_statement: Option<String>,
    is_true: Option<bool>,
}

/// A loaded dataset together with the modification time of the file it came from.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub dataset: ExamDataset,
    pub modified_at: OffsetDateTime,
}

fn invalid(message: &str, location: String) -> AppError {
    AppError::new("DATASET_INVALID", message).with_details(location)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse and validate a dataset. Any integrity fault rejects the whole document.
pub fn parse_dataset(json: &str) -> Result<ExamDataset, AppError> {
    let raw: RawDataset = serde_json::from_str(json).map_err(|e| {
        AppError::new("DATASET_PARSE_FAILED", "Dataset is not valid JSON")
            .with_details(e.to_string())
    })?;
    let raw_parts = raw
        .parts
        .ok_or_else(|| invalid("Dataset is missing the top-level `parts` array", "parts".into()))?;

    let mut seen_parts = BTreeSet::new();
    let mut parts = Vec::with_capacity(raw_parts.len());
    for (idx, rp) in raw_parts.into_iter().enumerate() {
        let loc = format!("parts[{idx}]");
        let part_number = match rp.part {
            Some(p @ 1..=3) => p as u8,
            Some(p) => {
                return Err(invalid(
                    "Exam part number must be 1, 2 or 3",
                    format!("{loc}; part={p}"),
                ))
            }
            None => return Err(invalid("Exam part is missing `part`", loc)),
        };
        if !seen_parts.insert(part_number) {
            return Err(invalid(
                "Exam part number appears more than once",
                format!("{loc}; part={part_number}"),
            ));
        }
        let introduction = non_blank(rp.introduction)
            .ok_or_else(|| invalid("Exam part is missing `introduction`", loc.clone()))?;
        let raw_questions = rp
            .questions
            .ok_or_else(|| invalid("Exam part is missing `questions`", loc.clone()))?;

        let mut seen_numbers = BTreeSet::new();
        let mut questions = Vec::with_capacity(raw_questions.len());
        for (qidx, rq) in raw_questions.into_iter().enumerate() {
            let qloc = format!("{loc}.questions[{qidx}]");
            let q = validate_question(part_number, rq, &qloc)?;
            if !seen_numbers.insert(q.question_number) {
                return Err(invalid(
                    "Question number appears more than once in this part",
                    format!("{qloc}; question_number={}", q.question_number),
                ));
            }
            questions.push(q);
        }

        parts.push(ExamPart {
            part_number,
            introduction,
            questions,
        });
    }

    Ok(ExamDataset { parts })
}

fn validate_question(part: u8, rq: RawQuestion, loc: &str) -> Result<ExamQuestion, AppError> {
    let question_number = match rq.question_number {
        Some(n) if n >= 0 && n <= u32::MAX as i64 => n as u32,
        Some(n) => {
            return Err(invalid(
                "Question number is out of range",
                format!("{loc}; question_number={n}"),
            ))
        }
        None => return Err(invalid("Question is missing `question_number`", loc.to_string())),
    };
    let text = non_blank(rq.text)
        .ok_or_else(|| invalid("Question is missing `text`", loc.to_string()))?;
    let topic = non_blank(rq.topic).map(|t| t.trim().to_string());

    let body = if part == 2 {
        let exam_statement = non_blank(rq.exam_statement).ok_or_else(|| {
            invalid("Part 2 question is missing `exam_statement`", loc.to_string())
        })?;
        let is_true = rq
            .is_true
            .ok_or_else(|| invalid("Part 2 question is missing `is_true`", loc.to_string()))?;
        QuestionBody::TrueFalse {
            exam_statement,
            is_true,
        }
    } else {
        let exam_question = non_blank(rq.exam_question).ok_or_else(|| {
            invalid(
                "Multiple-choice question is missing `exam_question`",
                loc.to_string(),
            )
        })?;
        let answers = validate_answers(rq.answers, rq.correct_option.as_deref(), loc)?;
        QuestionBody::MultipleChoice {
            exam_question,
            answers,
        }
    };

    Ok(ExamQuestion {
        question_number,
        text,
        topic,
        body,
    })
}

fn validate_answers(
    raw: Option<Vec<RawAnswer>>,
    correct_option: Option<&str>,
    loc: &str,
) -> Result<Vec<Answer>, AppError> {
    let raw = raw.ok_or_else(|| invalid("Multiple-choice question is missing `answers`", loc.to_string()))?;
    if raw.len() != 3 {
        return Err(invalid(
            "Multiple-choice question must have exactly three answers",
            format!("{loc}; answers={}", raw.len()),
        ));
    }

    let mut answers = Vec::with_capacity(3);
    for (aidx, ra) in raw.into_iter().enumerate() {
        let aloc = format!("{loc}.answers[{aidx}]");
        let option = non_blank(ra.option)
            .ok_or_else(|| invalid("Answer is missing `option`", aloc.clone()))?;
        let text = non_blank(ra.text).ok_or_else(|| invalid("Answer is missing `text`", aloc))?;
        answers.push(Answer {
            option,
            text,
            correct: ra.correct,
        });
    }

    // `correct_option` may stand in for per-answer flags; when both exist they must agree.
    if let Some(opt) = correct_option {
        let flagged: Vec<&str> = answers
            .iter()
            .filter(|a| a.correct)
            .map(|a| a.option.as_str())
            .collect();
        if flagged.is_empty() {
            let target = answers
                .iter_mut()
                .find(|a| a.option == opt)
                .ok_or_else(|| {
                    invalid(
                        "`correct_option` does not name any answer",
                        format!("{loc}; correct_option={opt}"),
                    )
                })?;
            target.correct = true;
        } else if flagged != [opt] {
            return Err(invalid(
                "`correct_option` disagrees with the answer flagged correct",
                format!("{loc}; correct_option={opt}; flagged={}", flagged.join(",")),
            ));
        }
    }

    let correct = answers.iter().filter(|a| a.correct).count();
    if correct != 1 {
        return Err(invalid(
            "Multiple-choice question must have exactly one correct answer",
            format!("{loc}; correct={correct}"),
        ));
    }
    Ok(answers)
}

pub fn source_modified_at(path: &Path) -> Result<OffsetDateTime, AppError> {
    let meta = fs::metadata(path).map_err(|e| {
        AppError::new("DATASET_READ_FAILED", "Failed to read dataset file metadata")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let modified = meta.modified().map_err(|e| {
        AppError::new("DATASET_READ_FAILED", "Dataset file has no modification time")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    Ok(OffsetDateTime::from(modified))
}

pub fn load_dataset(path: &Path) -> Result<SourceSnapshot, AppError> {
    let modified_at = source_modified_at(path)?;
    let raw = fs::read_to_string(path).map_err(|e| {
        AppError::new("DATASET_READ_FAILED", "Failed to read dataset file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let dataset = parse_dataset(&raw).map_err(|e| {
        let details = match e.details.as_deref() {
            Some(d) => format!("path={}; {d}", path.display()),
            None => format!("path={}", path.display()),
        };
        AppError::new(e.code, e.message).with_details(details)
    })?;
    tracing::debug!(
        path = %path.display(),
        parts = dataset.parts.len(),
        questions = dataset.question_count(),
        "dataset loaded"
    );
    Ok(SourceSnapshot {
        dataset,
        modified_at,
    })
}

/// Write `dataset` as pretty JSON, replacing `path` in one rename so a watcher of the
/// file's modification time never sees a half-written document.
pub fn save_dataset(path: &Path, dataset: &ExamDataset) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(dataset).map_err(|e| {
        AppError::new("DATASET_WRITE_FAILED", "Failed to encode dataset").with_details(e.to_string())
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new("DATASET_WRITE_FAILED", "Failed to create dataset directory")
                .with_details(format!("path={}; err={}", parent.display(), e))
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| {
        AppError::new("DATASET_WRITE_FAILED", "Failed to write dataset file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("DATASET_WRITE_FAILED", "Failed to move dataset file into place")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    tracing::info!(path = %path.display(), questions = dataset.question_count(), "dataset written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_option_marks_answer_when_no_flags() {
        let json = r#"{"parts":[{"part":1,"introduction":"Teil 1","questions":[
            {"question_number":1,"text":"- Hallo","exam_question":"Was?",
             "answers":[{"option":"A","text":"x"},{"option":"B","text":"y"},{"option":"C","text":"z"}],
             "correct_option":"B"}]}]}"#;
        let ds = parse_dataset(json).expect("parse");
        let body = &ds.parts[0].questions[0].body;
        assert_eq!(body.correct_option(), Some("B"));
        assert_eq!(body.correct_answer(), "y");
    }

    #[test]
    fn part_two_answer_is_richtig_or_falsch() {
        let json = r#"{"parts":[{"part":2,"introduction":"Teil 2","questions":[
            {"question_number":1,"text":"Durchsage","exam_statement":"Zu.","is_true":false}]}]}"#;
        let ds = parse_dataset(json).expect("parse");
        assert_eq!(ds.parts[0].questions[0].body.correct_answer(), "Falsch");
    }
}
