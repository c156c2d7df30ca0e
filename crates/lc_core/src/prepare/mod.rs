use std::collections::BTreeSet;

use crate::domain::{
    entry_id, tags, ContentType, ExamDataset, ExamPart, Metadata, MetaValue, QuestionBody,
};
use crate::error::AppError;

/// Parallel sequences ready for bulk insertion into the index store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedDocuments {
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub ids: Vec<String>,
}

impl PreparedDocuments {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn push(&mut self, id: String, document: String, metadata: Metadata) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
    }
}

/// Flatten a validated dataset into index entries.
///
/// Every part contributes its introduction; every question contributes its
/// dialogue/statement text and its exam question (parts 1/3) or exam statement (part 2).
/// Output order follows the dataset order. A dataset assembled by hand that breaks the
/// part/question shape is rejected as a whole.
pub fn prepare_documents(dataset: &ExamDataset) -> Result<PreparedDocuments, AppError> {
    let mut out = PreparedDocuments::default();

    for part in dataset.parts.iter() {
        check_part(part)?;
        let p = part.part_number;

        let mut meta = Metadata::new();
        meta.insert(tags::CONTENT_TYPE.into(), ContentType::Instruction.into());
        meta.insert(tags::PART.into(), MetaValue::Int(p as i64));
        meta.insert(tags::IS_DERIVATIVE.into(), false.into());
        out.push(
            entry_id(p, None, ContentType::Instruction),
            part.introduction.clone(),
            meta,
        );

        for q in part.questions.iter() {
            let mut base = Metadata::new();
            base.insert(tags::PART.into(), MetaValue::Int(p as i64));
            base.insert(
                tags::QUESTION_NUMBER.into(),
                MetaValue::Int(q.question_number as i64),
            );
            if let Some(topic) = q.topic.as_deref() {
                base.insert(tags::TOPIC.into(), topic.into());
            }
            base.insert(tags::IS_DERIVATIVE.into(), false.into());

            let mut content_meta = base.clone();
            content_meta.insert(
                tags::CONTENT_TYPE.into(),
                ContentType::DialogueOrStatement.into(),
            );
            out.push(
                entry_id(p, Some(q.question_number), ContentType::DialogueOrStatement),
                q.text.clone(),
                content_meta,
            );

            let kind = q.body.content_type();
            let mut question_meta = base;
            question_meta.insert(tags::CONTENT_TYPE.into(), kind.into());
            question_meta.insert(
                tags::CORRECT_ANSWER.into(),
                q.body.correct_answer().into(),
            );
            out.push(
                entry_id(p, Some(q.question_number), kind),
                q.body.prompt_text().to_string(),
                question_meta,
            );
        }
    }

    let unique: BTreeSet<&str> = out.ids.iter().map(String::as_str).collect();
    if unique.len() != out.ids.len() {
        return Err(AppError::new(
            "DATASET_INVALID",
            "Dataset produces duplicate entry identifiers",
        )
        .with_details(format!("ids={}; unique={}", out.ids.len(), unique.len())));
    }
    Ok(out)
}

fn check_part(part: &ExamPart) -> Result<(), AppError> {
    let p = part.part_number;
    if !(1..=3).contains(&p) {
        return Err(AppError::new("DATASET_INVALID", "Exam part number must be 1, 2 or 3")
            .with_details(format!("part={p}")));
    }
    if part.introduction.trim().is_empty() {
        return Err(AppError::new("DATASET_INVALID", "Exam part is missing `introduction`")
            .with_details(format!("part={p}")));
    }
    for q in part.questions.iter() {
        let loc = format!("part={p}; question_number={}", q.question_number);
        if q.text.trim().is_empty() || q.body.prompt_text().trim().is_empty() {
            return Err(AppError::new("DATASET_INVALID", "Question is missing required text")
                .with_details(loc));
        }
        let shape_ok = match &q.body {
            QuestionBody::TrueFalse { .. } => p == 2,
            QuestionBody::MultipleChoice { answers, .. } => {
                p != 2 && answers.len() == 3 && answers.iter().filter(|a| a.correct).count() == 1
            }
        };
        if !shape_ok {
            return Err(AppError::new(
                "DATASET_INVALID",
                "Question fields do not match the question type of its part",
            )
            .with_details(loc));
        }
    }
    Ok(())
}
