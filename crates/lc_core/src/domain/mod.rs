use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub option: String,
    pub text: String,
    pub correct: bool,
}

/// The graded part of a question. Parts 1 and 3 are multiple choice, part 2 is true/false.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum QuestionBody {
    MultipleChoice {
        exam_question: String,
        answers: Vec<Answer>,
    },
    TrueFalse {
        exam_statement: String,
        is_true: bool,
    },
}

impl QuestionBody {
    pub fn prompt_text(&self) -> &str {
        match self {
            QuestionBody::MultipleChoice { exam_question, .. } => exam_question,
            QuestionBody::TrueFalse { exam_statement, .. } => exam_statement,
        }
    }

    /// Text of the correct answer; true/false questions answer with `Richtig` or `Falsch`.
    pub fn correct_answer(&self) -> &str {
        match self {
            QuestionBody::MultipleChoice { answers, .. } => answers
                .iter()
                .find(|a| a.correct)
                .map(|a| a.text.as_str())
                .unwrap_or(""),
            QuestionBody::TrueFalse { is_true, .. } => {
                if *is_true {
                    "Richtig"
                } else {
                    "Falsch"
                }
            }
        }
    }

    pub fn correct_option(&self) -> Option<&str> {
        match self {
            QuestionBody::MultipleChoice { answers, .. } => {
                answers.iter().find(|a| a.correct).map(|a| a.option.as_str())
            }
            QuestionBody::TrueFalse { .. } => None,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            QuestionBody::MultipleChoice { .. } => ContentType::ExamQuestion,
            QuestionBody::TrueFalse { .. } => ContentType::ExamStatement,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExamQuestion {
    pub question_number: u32,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExamPart {
    #[serde(rename = "part")]
    pub part_number: u8,
    pub introduction: String,
    pub questions: Vec<ExamQuestion>,
}

/// A validated exam. Build it through `crate::dataset`, which rejects malformed input.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExamDataset {
    pub parts: Vec<ExamPart>,
}

impl ExamDataset {
    pub fn question_count(&self) -> usize {
        self.parts.iter().map(|p| p.questions.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Instruction,
    DialogueOrStatement,
    ExamQuestion,
    ExamStatement,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Instruction => "instruction",
            ContentType::DialogueOrStatement => "dialogue_or_statement",
            ContentType::ExamQuestion => "exam_question",
            ContentType::ExamStatement => "exam_statement",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "instruction" => Some(ContentType::Instruction),
            "dialogue_or_statement" => Some(ContentType::DialogueOrStatement),
            "exam_question" => Some(ContentType::ExamQuestion),
            "exam_statement" => Some(ContentType::ExamStatement),
            _ => None,
        }
    }

    /// Suffix used in entry identifiers.
    pub fn id_suffix(&self) -> &'static str {
        match self {
            ContentType::Instruction => "intro",
            ContentType::DialogueOrStatement => "content",
            ContentType::ExamQuestion => "question",
            ContentType::ExamStatement => "statement",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar metadata tag value. Variant order matters for untagged decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{b}"),
            MetaValue::Int(i) => write!(f, "{i}"),
            MetaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<ContentType> for MetaValue {
    fn from(v: ContentType) -> Self {
        MetaValue::Str(v.as_str().to_string())
    }
}

/// Flat tag map attached to every index entry.
pub type Metadata = BTreeMap<String, MetaValue>;

pub mod tags {
    pub const CONTENT_TYPE: &str = "content_type";
    pub const PART: &str = "part";
    pub const QUESTION_NUMBER: &str = "question_number";
    pub const TOPIC: &str = "topic";
    pub const CORRECT_ANSWER: &str = "correct_answer";
    pub const IS_DERIVATIVE: &str = "is_derivative";
    pub const ORIGINAL_ID: &str = "original_id";
}

/// Deterministic identifier for a dataset entry.
pub fn entry_id(part: u8, question_number: Option<u32>, content_type: ContentType) -> String {
    match question_number {
        Some(n) => format!("part_{part}_q{n}_{}", content_type.id_suffix()),
        None => format!("part_{part}_{}", content_type.id_suffix()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
}

impl IndexEntry {
    pub fn content_type(&self) -> Option<ContentType> {
        self.metadata
            .get(tags::CONTENT_TYPE)
            .and_then(MetaValue::as_str)
            .and_then(ContentType::parse)
    }

    pub fn part(&self) -> Option<u8> {
        self.metadata
            .get(tags::PART)
            .and_then(MetaValue::as_i64)
            .and_then(|p| u8::try_from(p).ok())
    }

    pub fn question_number(&self) -> Option<u32> {
        self.metadata
            .get(tags::QUESTION_NUMBER)
            .and_then(MetaValue::as_i64)
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn topic(&self) -> Option<&str> {
        self.metadata.get(tags::TOPIC).and_then(MetaValue::as_str)
    }

    pub fn is_derivative(&self) -> bool {
        self.metadata
            .get(tags::IS_DERIVATIVE)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }
}
