use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use pretty_assertions::assert_eq;

use lc_ai::embeddings::Embedder;
use lc_ai::index::IndexOptions;
use lc_ai::pipeline::{CollectionStats, QuestionIndex};
use lc_ai::retrieve::SearchOptions;
use lc_core::config::DistanceMetric;
use lc_core::error::AppError;

const SAMPLE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/sample_exam.json"
));

#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = input.to_lowercase();
        Ok(vec![lower.matches("kost").count() as f32, lower.matches("zug").count() as f32])
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    dataset: PathBuf,
    index_dir: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dir.path().join("questions.json");
    fs::write(&dataset, SAMPLE).expect("write dataset");
    let index_dir = dir.path().join("index");
    Fixture {
        _dir: dir,
        dataset,
        index_dir,
    }
}

fn open(fx: &Fixture, embedder: Arc<CountingEmbedder>, model: &str) -> QuestionIndex {
    QuestionIndex::open(
        &fx.dataset,
        &fx.index_dir,
        embedder,
        IndexOptions {
            model: model.to_string(),
            metric: DistanceMetric::L2,
        },
    )
    .expect("open")
}

fn bump_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .expect("set_modified");
}

#[test]
fn empty_store_is_rebuilt_once() {
    let fx = fixture();
    let index = open(&fx, Arc::new(CountingEmbedder::default()), "m");

    assert!(index.ensure_fresh().expect("first"));
    assert_eq!(index.store().count().expect("count"), 13);
    assert!(!index.ensure_fresh().expect("second"));
}

#[test]
fn freshness_survives_reopen() {
    let fx = fixture();
    let embedder = Arc::new(CountingEmbedder::default());
    {
        let index = open(&fx, embedder.clone(), "m");
        assert!(index.ensure_fresh().expect("build"));
        assert!(index.status().expect("status").last_indexed_at.is_some());
    }

    let reopened = open(&fx, embedder, "m");
    assert!(!reopened.ensure_fresh().expect("reopened"));
}

#[test]
fn newer_source_triggers_rebuild() {
    let fx = fixture();
    let index = open(&fx, Arc::new(CountingEmbedder::default()), "m");
    index.ensure_fresh().expect("build");

    bump_mtime(&fx.dataset, 120);
    assert!(index.ensure_fresh().expect("stale"));
    assert!(!index.ensure_fresh().expect("fresh again"));
}

#[test]
fn changed_embedding_model_forces_rebuild() {
    let fx = fixture();
    let embedder = Arc::new(CountingEmbedder::default());
    open(&fx, embedder.clone(), "model-a").ensure_fresh().expect("build");

    let switched = open(&fx, embedder, "model-b");
    assert!(switched.ensure_fresh().expect("rebuild"));
    assert_eq!(switched.status().expect("status").model.as_deref(), Some("model-b"));
}

#[test]
fn failed_rebuild_keeps_previous_index_and_timestamp() {
    let fx = fixture();
    let index = open(&fx, Arc::new(CountingEmbedder::default()), "m");
    index.ensure_fresh().expect("build");
    let before = index.status().expect("status");

    fs::write(&fx.dataset, r#"{"parts": [{"part": 7}]}"#).expect("corrupt");
    bump_mtime(&fx.dataset, 120);

    let err = index.ensure_fresh().unwrap_err();
    assert!(err.code.starts_with("DATASET_"), "unexpected code {}", err.code);
    assert_eq!(index.status().expect("status"), before);

    // Still stale: the next call tries again.
    assert!(index.ensure_fresh().is_err());
}

#[test]
fn forced_rebuild_reuses_cached_embeddings() {
    let fx = fixture();
    let embedder = Arc::new(CountingEmbedder::default());
    let index = open(&fx, embedder.clone(), "m");

    assert_eq!(index.rebuild().expect("first"), 13);
    let calls = embedder.calls.load(Ordering::SeqCst);
    assert_eq!(index.rebuild().expect("second"), 13);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
}

#[test]
fn search_builds_the_index_on_demand() {
    let fx = fixture();
    let index = open(&fx, Arc::new(CountingEmbedder::default()), "m");

    let results = index.search("Zug", &SearchOptions::default()).expect("search");
    assert_eq!(results[0].id, "part_2_q1_content");
    assert_eq!(
        index.collection_stats().expect("stats"),
        CollectionStats {
            total: 13,
            original: 13,
            derivative: 0,
        }
    );
}

#[test]
fn missing_dataset_is_reported() {
    let fx = fixture();
    fs::remove_file(&fx.dataset).expect("remove");
    let index = open(&fx, Arc::new(CountingEmbedder::default()), "m");
    assert_eq!(index.ensure_fresh().unwrap_err().code, "DATASET_READ_FAILED");
}
