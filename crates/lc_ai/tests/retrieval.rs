use std::sync::Arc;

use pretty_assertions::assert_eq;

use lc_ai::embeddings::Embedder;
use lc_ai::index::{IndexOptions, IndexStore};
use lc_ai::retrieve::{format_results, search, SearchOptions};
use lc_core::config::DistanceMetric;
use lc_core::dataset::parse_dataset;
use lc_core::domain::{tags, ContentType, Metadata};
use lc_core::error::AppError;
use lc_core::prepare::{prepare_documents, PreparedDocuments};

const SAMPLE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/sample_exam.json"
));

const KEYWORDS: [&str; 6] = ["kost", "euro", "schnitzel", "zug", "termin", "schuhe"];

/// One dimension per keyword; queries containing "offline" fail like an unreachable backend.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let lower = input.to_lowercase();
        if lower.contains("offline") {
            return Err(AppError::new("EMBEDDINGS_UNREACHABLE", "backend down").with_retryable(true));
        }
        Ok(KEYWORDS.iter().map(|k| lower.matches(k).count() as f32).collect())
    }
}

fn sample_store() -> (tempfile::TempDir, IndexStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(
        dir.path(),
        Arc::new(KeywordEmbedder),
        IndexOptions {
            model: "keywords".to_string(),
            metric: DistanceMetric::L2,
        },
    )
    .expect("open");
    let docs = prepare_documents(&parse_dataset(SAMPLE).expect("parse")).expect("prepare");
    store.replace_all(&docs).expect("replace_all");
    (dir, store)
}

#[test]
fn best_match_comes_first_with_scores_in_unit_range() {
    let (_dir, store) = sample_store();
    let results = search(&store, "Was kostet die Tasche in Euro?", &SearchOptions::default()).expect("search");

    assert_eq!(results[0].id, "part_1_q1_content");
    assert_eq!(results[0].score, 1.0);
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results
        .iter()
        .all(|r| r.metadata.get(tags::CONTENT_TYPE).and_then(|v| v.as_str()) == Some("dialogue_or_statement")));
}

#[test]
fn never_returns_more_than_max_results() {
    let (_dir, store) = sample_store();
    for k in 0..=8 {
        let opts = SearchOptions {
            max_results: k,
            ..SearchOptions::default()
        };
        let results = search(&store, "Termin", &opts).expect("search");
        assert!(results.len() <= k, "k={k} got {}", results.len());
        // Five dialogue/statement entries in the sample.
        assert_eq!(results.len(), k.min(5));
    }
}

#[test]
fn threshold_above_every_score_yields_empty_list() {
    let (_dir, store) = sample_store();
    let opts = SearchOptions {
        max_results: 2,
        similarity_threshold: Some(0.5),
        ..SearchOptions::default()
    };
    let results = search(&store, "Restaurant", &opts).expect("search");
    assert!(results.is_empty());
    assert_eq!(format_results(&results), "No matching questions found.");
}

#[test]
fn threshold_keeps_only_strictly_better_scores() {
    let (_dir, store) = sample_store();
    let opts = SearchOptions {
        similarity_threshold: Some(0.5),
        ..SearchOptions::default()
    };
    let results = search(&store, "kostet Euro", &opts).expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "part_1_q1_content");
}

#[test]
fn backend_failure_is_an_error_not_an_empty_list() {
    let (_dir, store) = sample_store();
    let err = search(&store, "offline", &SearchOptions::default()).unwrap_err();
    assert_eq!(err.code, "EMBEDDINGS_UNREACHABLE");
    assert!(err.retryable);
}

#[test]
fn invalid_arguments_are_rejected() {
    let (_dir, store) = sample_store();
    let err = search(&store, "   ", &SearchOptions::default()).unwrap_err();
    assert_eq!(err.code, "QUERY_INVALID_ARGUMENT");

    let opts = SearchOptions {
        similarity_threshold: Some(f32::NAN),
        ..SearchOptions::default()
    };
    assert_eq!(search(&store, "Zug", &opts).unwrap_err().code, "QUERY_INVALID_ARGUMENT");
}

#[test]
fn originals_only_excludes_derivatives() {
    let (_dir, store) = sample_store();

    let mut extra = PreparedDocuments::default();
    let mut meta = Metadata::new();
    meta.insert(tags::CONTENT_TYPE.into(), ContentType::DialogueOrStatement.into());
    meta.insert(tags::PART.into(), 1i64.into());
    meta.insert(tags::IS_DERIVATIVE.into(), true.into());
    meta.insert(tags::ORIGINAL_ID.into(), "part_1_q1_content".into());
    extra.ids.push("part_1_q1_content_derivative_0".to_string());
    extra.documents.push("- Was kostet der Kuchen? - Drei Euro.".to_string());
    extra.metadatas.push(meta);
    store.add_batch(&extra).expect("add_batch");

    let all = search(&store, "kostet Euro", &SearchOptions::default()).expect("all");
    assert!(all.iter().any(|r| r.id == "part_1_q1_content_derivative_0"));

    let originals = search(
        &store,
        "kostet Euro",
        &SearchOptions {
            include_derivatives: false,
            ..SearchOptions::default()
        },
    )
    .expect("originals");
    assert!(originals.iter().all(|r| !r.id.contains("_derivative_")));
    assert_eq!(originals.len(), 5);
}
