use lc_core::domain::{tags, ContentType, IndexEntry, MetaValue};
use lc_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::index::{IndexStore, TagFilter};

/// A dialogue/statement joined with the exam question or statement that tests it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicQuestion {
    pub text: String,
    pub question: String,
    pub part: u8,
    pub topic: String,
    pub kind: ContentType,
    pub question_number: Option<u32>,
    pub correct_answer: Option<String>,
}

fn expected_kind(part: u8) -> ContentType {
    if part == 2 {
        ContentType::ExamStatement
    } else {
        ContentType::ExamQuestion
    }
}

/// Join key is `(part, question_number)` when both sides carry a number; otherwise the
/// first question entry of the same part wins, in retrieval order.
fn find_partner<'a>(content: &IndexEntry, part: u8, questions: &'a [IndexEntry]) -> Option<&'a IndexEntry> {
    let kind = expected_kind(part);
    let same_part = |q: &&IndexEntry| q.part() == Some(part) && q.content_type() == Some(kind);

    if let Some(n) = content.question_number() {
        if let Some(exact) = questions
            .iter()
            .filter(same_part)
            .find(|q| q.question_number() == Some(n))
        {
            return Some(exact);
        }
    }
    questions
        .iter()
        .filter(same_part)
        .find(|q| q.question_number().is_none() || content.question_number().is_none())
}

/// Dataset questions tagged with `topic`, one record per dialogue/statement.
pub fn questions_for_topic(index: &IndexStore, topic: &str) -> Result<Vec<TopicQuestion>, AppError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(AppError::new("QUERY_INVALID_ARGUMENT", "Topic must not be empty"));
    }

    let filter = TagFilter::new()
        .eq(tags::TOPIC, topic)
        .eq(tags::IS_DERIVATIVE, false);
    let entries = index.get(&filter)?;

    let mut contents: Vec<IndexEntry> = Vec::new();
    let mut questions: Vec<IndexEntry> = Vec::new();
    for e in entries {
        match e.content_type() {
            Some(ContentType::DialogueOrStatement) => contents.push(e),
            Some(ContentType::ExamQuestion) | Some(ContentType::ExamStatement) => questions.push(e),
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(contents.len());
    for content in contents.iter() {
        let Some(part) = content.part() else {
            tracing::warn!(id = %content.id, "topic entry without part tag skipped");
            continue;
        };
        let Some(partner) = find_partner(content, part, &questions) else {
            tracing::warn!(id = %content.id, part, "no question entry to join with");
            continue;
        };
        out.push(TopicQuestion {
            text: content.document.clone(),
            question: partner.document.clone(),
            part,
            topic: topic.to_string(),
            kind: expected_kind(part),
            question_number: content.question_number(),
            correct_answer: partner
                .metadata
                .get(tags::CORRECT_ANSWER)
                .and_then(MetaValue::as_str)
                .map(str::to_string),
        });
    }

    tracing::debug!(topic, records = out.len(), "topic questions grouped");
    Ok(out)
}
