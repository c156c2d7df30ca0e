//! The dataset-backed question index: one source file, one store, one freshness record.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use lc_core::config::AppConfig;
use lc_core::dataset::{load_dataset, source_modified_at};
use lc_core::domain::tags;
use lc_core::error::AppError;
use lc_core::prepare::prepare_documents;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::freshness::{format_timestamp, parse_timestamp, FreshnessTracker};
use crate::index::{IndexOptions, IndexStatus, IndexStore, TagFilter, META_EMBED_MODEL, META_LAST_INDEXED_AT};
use crate::retrieve::{search, SearchOptions, SearchResult};
use crate::topics::{questions_for_topic, TopicQuestion};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    pub total: usize,
    pub original: usize,
    pub derivative: usize,
}

#[derive(Debug)]
pub struct QuestionIndex {
    dataset_path: PathBuf,
    store: IndexStore,
    tracker: Mutex<FreshnessTracker>,
}

impl QuestionIndex {
    pub fn open(
        dataset_path: &Path,
        index_dir: &Path,
        embedder: Arc<dyn Embedder>,
        options: IndexOptions,
    ) -> Result<Self, AppError> {
        let store = IndexStore::open(index_dir, embedder, options)?;

        let mut last_indexed = match store.get_meta(META_LAST_INDEXED_AT)? {
            Some(raw) => match parse_timestamp(&raw) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable index timestamp");
                    None
                }
            },
            None => None,
        };
        if let Some(stored) = store.get_meta(META_EMBED_MODEL)? {
            if stored != store.model() {
                tracing::info!(stored = %stored, configured = %store.model(), "embedding model changed; index will be rebuilt");
                last_indexed = None;
            }
        }

        Ok(Self {
            dataset_path: dataset_path.to_path_buf(),
            store,
            tracker: Mutex::new(FreshnessTracker::with_last_indexed(last_indexed)),
        })
    }

    pub fn from_config(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Result<Self, AppError> {
        Self::open(
            &config.dataset_path,
            &config.index_dir,
            embedder,
            IndexOptions {
                model: config.ollama.embed_model.clone(),
                metric: config.search.metric,
            },
        )
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    fn tracker(&self) -> Result<MutexGuard<'_, FreshnessTracker>, AppError> {
        self.tracker
            .lock()
            .map_err(|_| AppError::new("INDEX_LOCK_POISONED", "Freshness lock poisoned"))
    }

    /// Rebuild when the store is empty or the dataset changed since the last rebuild.
    /// Returns whether a rebuild ran.
    pub fn ensure_fresh(&self) -> Result<bool, AppError> {
        let mut tracker = self.tracker()?;
        let source_mtime = source_modified_at(&self.dataset_path)?;
        let count = self.store.count()?;
        if !tracker.needs_update(count, source_mtime) {
            tracing::debug!(entries = count, "index is fresh");
            return Ok(false);
        }
        tracing::info!(entries = count, path = %self.dataset_path.display(), "index is stale; rebuilding");
        self.rebuild_locked(&mut tracker)?;
        Ok(true)
    }

    /// Unconditional rebuild from the dataset file. Returns the number of entries written.
    pub fn rebuild(&self) -> Result<usize, AppError> {
        let mut tracker = self.tracker()?;
        self.rebuild_locked(&mut tracker)
    }

    fn rebuild_locked(&self, tracker: &mut FreshnessTracker) -> Result<usize, AppError> {
        let snapshot = load_dataset(&self.dataset_path)?;
        let docs = prepare_documents(&snapshot.dataset)?;
        let written = self.store.replace_all(&docs)?;

        self.store
            .set_meta(META_LAST_INDEXED_AT, &format_timestamp(snapshot.modified_at)?)?;
        tracker.record(snapshot.modified_at);
        tracing::info!(
            entries = written,
            questions = snapshot.dataset.question_count(),
            "index rebuilt"
        );
        Ok(written)
    }

    pub fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>, AppError> {
        self.ensure_fresh()?;
        search(&self.store, query, opts)
    }

    pub fn questions_for_topic(&self, topic: &str) -> Result<Vec<TopicQuestion>, AppError> {
        self.ensure_fresh()?;
        questions_for_topic(&self.store, topic)
    }

    pub fn collection_stats(&self) -> Result<CollectionStats, AppError> {
        let total = self.store.count()?;
        let derivative = self
            .store
            .get(&TagFilter::new().eq(tags::IS_DERIVATIVE, true))?
            .len();
        Ok(CollectionStats {
            total,
            original: total.saturating_sub(derivative),
            derivative,
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        self.store.status()
    }
}
