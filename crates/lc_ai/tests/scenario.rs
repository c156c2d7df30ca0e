use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;

use lc_ai::embeddings::Embedder;
use lc_ai::index::{IndexOptions, IndexStore};
use lc_ai::llm::Llm;
use lc_ai::scenario::{Scenario, ScenarioGenerator};
use lc_core::config::DistanceMetric;
use lc_core::dataset::parse_dataset;
use lc_core::error::AppError;
use lc_core::prepare::prepare_documents;

const SAMPLE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/sample_exam.json"
));

const GENERATED: &str = r#"Gern, hier ist die Prüfung:
```json
{"parts": [
  {"part": 2, "introduction": "Teil 2: Kreuzen Sie an richtig oder falsch.",
   "questions": [{"question_number": 1, "topic": "shopping",
     "text": "Liebe Kunden, der Supermarkt schließt heute um 18 Uhr.",
     "exam_statement": "Der Supermarkt ist heute bis 20 Uhr offen.", "is_true": false}]},
  {"part": 1, "introduction": "Teil 1: Was ist richtig? Kreuzen Sie an A, B oder C.",
   "questions": [{"question_number": 1, "topic": "shopping",
     "text": "- Was kostet der Käse?\n- 3 Euro.",
     "exam_question": "Wie viel kostet der Käse?",
     "answers": [{"option": "A", "text": "2 Euro", "correct": false},
                 {"option": "B", "text": "3 Euro", "correct": true},
                 {"option": "C", "text": "4 Euro", "correct": false}]}]},
  {"part": 3, "introduction": "Teil 3: Was ist richtig? Kreuzen Sie an A, B oder C.",
   "questions": [{"question_number": 1, "topic": "shopping",
     "text": "Hallo Anna, hier ist Tom. Kannst du bitte Brot kaufen?",
     "exam_question": "Was soll Anna kaufen?",
     "answers": [{"option": "A", "text": "Brot", "correct": true},
                 {"option": "B", "text": "Milch", "correct": false},
                 {"option": "C", "text": "Eier", "correct": false}]}]}
]}
```"#;

struct LengthEmbedder;

impl Embedder for LengthEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        Ok(vec![input.len() as f32])
    }
}

/// Returns a fixed reply and remembers the last prompt.
struct FixedLlm {
    reply: String,
    last_prompt: Mutex<Option<String>>,
}

impl FixedLlm {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_prompt: Mutex::new(None),
        }
    }
}

impl Llm for FixedLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        *self.last_prompt.lock().expect("lock") = Some(prompt.to_string());
        Ok(self.reply.clone())
    }
}

fn sample_store() -> (tempfile::TempDir, IndexStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(
        dir.path(),
        Arc::new(LengthEmbedder),
        IndexOptions {
            model: "len".to_string(),
            metric: DistanceMetric::L2,
        },
    )
    .expect("open");
    let docs = prepare_documents(&parse_dataset(SAMPLE).expect("parse")).expect("prepare");
    store.replace_all(&docs).expect("replace_all");
    (dir, store)
}

#[test]
fn generates_one_scenario_per_part_in_order() {
    let (_dir, store) = sample_store();
    let llm = FixedLlm::new(GENERATED);
    let scenarios = ScenarioGenerator::new(&llm, "llm")
        .generate(&store, "shopping")
        .expect("generate");

    assert_eq!(
        scenarios,
        vec![
            Scenario {
                part: 1,
                dialogue: "- Was kostet der Käse?\n- 3 Euro.".to_string(),
                question: "Wie viel kostet der Käse?".to_string(),
                options: vec!["2 Euro".to_string(), "3 Euro".to_string(), "4 Euro".to_string()],
                correct_index: 1,
            },
            Scenario {
                part: 2,
                dialogue: "Liebe Kunden, der Supermarkt schließt heute um 18 Uhr.".to_string(),
                question: "Der Supermarkt ist heute bis 20 Uhr offen.".to_string(),
                options: vec!["Richtig".to_string(), "Falsch".to_string()],
                correct_index: 1,
            },
            Scenario {
                part: 3,
                dialogue: "Hallo Anna, hier ist Tom. Kannst du bitte Brot kaufen?".to_string(),
                question: "Was soll Anna kaufen?".to_string(),
                options: vec!["Brot".to_string(), "Milch".to_string(), "Eier".to_string()],
                correct_index: 0,
            },
        ]
    );

    let prompt = llm.last_prompt.lock().expect("lock").clone().expect("prompt sent");
    assert!(prompt.contains("Wie viel kostet das?"));
    assert!(prompt.contains("\"shopping\""));
}

#[test]
fn unknown_topic_has_no_examples() {
    let (_dir, store) = sample_store();
    let llm = FixedLlm::new(GENERATED);
    let err = ScenarioGenerator::new(&llm, "llm")
        .generate(&store, "weather")
        .unwrap_err();
    assert_eq!(err.code, "GENERATION_NO_EXAMPLES");
    assert!(llm.last_prompt.lock().expect("lock").is_none());
}

#[test]
fn incomplete_exam_is_rejected() {
    let (_dir, store) = sample_store();
    let two_parts = r#"{"parts": [
  {"part": 2, "introduction": "Teil 2", "questions": [{"question_number": 1,
     "text": "Heute ist alles billiger.", "exam_statement": "Alles kostet mehr.", "is_true": false}]}
]}"#;
    let llm = FixedLlm::new(two_parts);
    let err = ScenarioGenerator::new(&llm, "llm")
        .generate(&store, "shopping")
        .unwrap_err();
    assert_eq!(err.code, "GENERATION_INVALID_RESPONSE");
}

#[test]
fn malformed_exam_is_rejected() {
    let (_dir, store) = sample_store();
    for reply in ["Leider kann ich das nicht.", r#"{"parts": [{"part": 1, "introduction": "Teil 1", "questions": [{"question_number": 1, "text": "x", "exam_question": "y", "answers": []}]}]}"#] {
        let llm = FixedLlm::new(reply);
        let err = ScenarioGenerator::new(&llm, "llm")
            .generate(&store, "shopping")
            .unwrap_err();
        assert_eq!(err.code, "GENERATION_INVALID_RESPONSE");
    }
}
