use std::sync::Mutex;

use pretty_assertions::assert_eq;

use lc_ai::llm::Llm;
use lc_ai::structure::TranscriptStructurer;
use lc_core::dataset::{load_dataset, save_dataset};
use lc_core::domain::QuestionBody;
use lc_core::error::AppError;

const TRANSCRIPT: &str = "[Musik] Teil 1 Nummer eins Entschuldigung was kostet die Tasche 19,95 Euro gut die nehme ich \
Teil 2 Achtung am Gleis 3 der Zug nach München hat zwanzig Minuten Verspätung";

/// Replies with a fenced bare array of parts, the shape models most often return.
const STRUCTURED: &str = r#"Hier ist das Ergebnis:
```json
[
  {"part": 1, "introduction": "Teil 1: Was ist richtig? Kreuzen Sie an A, B oder C.",
   "questions": [{"question_number": 1,
     "text": "- Entschuldigung, was kostet die Tasche? - 19,95 Euro. - Gut, die nehme ich.",
     "exam_question": "Wie viel kostet die Tasche?",
     "answers": [{"option": "A", "text": "9,95 Euro", "correct": false},
                 {"option": "B", "text": "19,95 Euro", "correct": true},
                 {"option": "C", "text": "29,95 Euro", "correct": false}]}]},
  {"part": 2, "introduction": "Teil 2: Kreuzen Sie an richtig oder falsch.",
   "questions": [{"question_number": 1,
     "text": "Achtung am Gleis 3: Der Zug nach München hat zwanzig Minuten Verspätung.",
     "exam_statement": "Der Zug kommt pünktlich.", "is_true": false}]}
]
```"#;

struct ScriptedLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl Llm for ScriptedLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

#[test]
fn transcript_becomes_a_valid_dataset_file() {
    let llm = ScriptedLlm::new(STRUCTURED);
    let dataset = TranscriptStructurer::new(&llm, "llm")
        .structure(TRANSCRIPT)
        .expect("structure");

    assert_eq!(dataset.parts.len(), 2);
    assert_eq!(dataset.question_count(), 2);
    assert_eq!(dataset.parts[0].questions[0].body.correct_answer(), "19,95 Euro");
    match &dataset.parts[1].questions[0].body {
        QuestionBody::TrueFalse { is_true, .. } => assert!(!is_true),
        other => panic!("expected true/false body, got {other:?}"),
    }

    let prompts = llm.prompts.lock().expect("lock");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Nummer eins Entschuldigung"));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("questions.json");
    save_dataset(&path, &dataset).expect("save");
    assert_eq!(load_dataset(&path).expect("load").dataset, dataset);
}

#[test]
fn invalid_structure_is_rejected() {
    // Part 1 question with only two answers.
    let reply = r#"{"parts": [{"part": 1, "introduction": "Teil 1", "questions": [
  {"question_number": 1, "text": "- Hallo.", "exam_question": "Wer?",
   "answers": [{"option": "A", "text": "Anna", "correct": true},
               {"option": "B", "text": "Tom", "correct": false}]}]}]}"#;
    for reply in [reply, "Das Transkript ist leider unklar.", r#"{"parts": []}"#] {
        let llm = ScriptedLlm::new(reply);
        let err = TranscriptStructurer::new(&llm, "llm")
            .structure(TRANSCRIPT)
            .unwrap_err();
        assert_eq!(err.code, "GENERATION_INVALID_RESPONSE", "reply: {reply}");
    }
}

#[test]
fn blank_transcript_never_reaches_the_model() {
    let llm = ScriptedLlm::new(STRUCTURED);
    let err = TranscriptStructurer::new(&llm, "llm")
        .structure(" \n ")
        .unwrap_err();
    assert_eq!(err.code, "GENERATION_EMPTY_TRANSCRIPT");
    assert!(llm.prompts.lock().expect("lock").is_empty());
}
