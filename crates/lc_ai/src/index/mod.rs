//! Persistent store of index entries and their embeddings, with tag-filtered
//! nearest-neighbour queries.
//!
//! Entries live in a single SQLite database inside the store directory. Bulk writes
//! (`replace_all`, `add_batch`) compute every embedding first and then apply the change
//! in one transaction, so a reader on any connection sees either the previous full set
//! or the new one. Writers are serialized by an internal lock.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use lc_core::config::DistanceMetric;
use lc_core::domain::{IndexEntry, Metadata};
use lc_core::error::AppError;
use lc_core::prepare::PreparedDocuments;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embeddings::Embedder;

mod filter;
pub mod similarity;

pub use filter::TagFilter;

pub const META_LAST_INDEXED_AT: &str = "last_indexed_at";
pub const META_EMBED_MODEL: &str = "embed_model";
pub const META_DIMS: &str = "dims";

const DB_FILE: &str = "index.sqlite3";

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub model: String,
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub entry: IndexEntry,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub entry_count: u32,
    pub last_indexed_at: Option<String>,
}

struct StoredRow {
    id: String,
    ordinal: i64,
    document: String,
    metadata_json: String,
    embedding_json: String,
}

pub struct IndexStore {
    dir: PathBuf,
    conn: Mutex<Connection>,
    writer: Mutex<()>,
    embedder: Arc<dyn Embedder>,
    model: String,
    metric: DistanceMetric,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("dir", &self.dir)
            .field("model", &self.model)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn store_err(code: &str, message: &str, e: impl std::fmt::Display) -> AppError {
    AppError::new(code, message).with_details(e.to_string())
}

impl IndexStore {
    pub fn open(dir: &Path, embedder: Arc<dyn Embedder>, options: IndexOptions) -> Result<Self, AppError> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new("INDEX_OPEN_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        let mut conn = lc_core::db::open(&dir.join(DB_FILE))?;
        lc_core::db::migrate(&mut conn)?;
        tracing::debug!(path = %dir.display(), model = %options.model, "index store opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            conn: Mutex::new(conn),
            writer: Mutex::new(()),
            embedder,
            model: options.model,
            metric: options.metric,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::new("INDEX_LOCK_POISONED", "Index connection lock poisoned"))
    }

    fn writer(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.writer
            .lock()
            .map_err(|_| AppError::new("INDEX_LOCK_POISONED", "Index writer lock poisoned"))
    }

    pub fn count(&self) -> Result<usize, AppError> {
        let conn = self.conn()?;
        count_entries(&conn)
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>, AppError> {
        let conn = self.conn()?;
        read_meta(&conn, key)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<(), AppError> {
        let conn = self.conn()?;
        write_meta(&conn, key, value)
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let conn = self.conn()?;
        let entry_count = count_entries(&conn)? as u32;
        let dims = read_meta(&conn, META_DIMS)?.and_then(|d| d.parse::<u32>().ok());
        Ok(IndexStatus {
            ready: entry_count > 0,
            model: read_meta(&conn, META_EMBED_MODEL)?,
            dims,
            entry_count,
            last_indexed_at: read_meta(&conn, META_LAST_INDEXED_AT)?,
        })
    }

    /// Replace the full entry set. On error the previous set stays visible.
    pub fn replace_all(&self, docs: &PreparedDocuments) -> Result<usize, AppError> {
        let _w = self.writer()?;
        validate_batch(docs)?;
        if docs.is_empty() {
            return Err(AppError::new(
                "DATASET_INVALID",
                "Refusing to replace the index with an empty entry set",
            ));
        }

        let vectors = self.embed_all(&docs.documents)?;
        let dims = uniform_dims(&vectors, &docs.ids, None)?;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to start index transaction", e))?;
        tx.execute("DELETE FROM entries", [])
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to clear index entries", e))?;
        insert_rows(&tx, docs, &vectors, 0, &self.model)?;
        let pruned = prune_cache(&tx, &self.model, &docs.documents)?;
        write_meta(&tx, META_EMBED_MODEL, &self.model)?;
        write_meta(&tx, META_DIMS, &dims.to_string())?;
        tx.commit()
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to commit index rebuild", e))?;
        tracing::debug!(pruned, "stale cached embeddings removed");

        tracing::info!(entries = docs.len(), dims, model = %self.model, "index replaced");
        Ok(docs.len())
    }

    /// Append entries without touching existing ones. Identifier collisions abort the batch.
    pub fn add_batch(&self, docs: &PreparedDocuments) -> Result<usize, AppError> {
        let _w = self.writer()?;
        validate_batch(docs)?;
        if docs.is_empty() {
            return Ok(0);
        }

        {
            let conn = self.conn()?;
            for id in docs.ids.iter() {
                if entry_exists(&conn, id)? {
                    return Err(AppError::new(
                        "DATASET_DUPLICATE_ID",
                        "Entry identifier already exists in the index",
                    )
                    .with_details(format!("id={id}")));
                }
            }
            self.ensure_model_matches(&conn)?;
        }

        let vectors = self.embed_all(&docs.documents)?;
        let mut conn = self.conn()?;
        let existing_dims = if count_entries(&conn)? > 0 {
            read_meta(&conn, META_DIMS)?.and_then(|d| d.parse::<usize>().ok())
        } else {
            None
        };
        let dims = uniform_dims(&vectors, &docs.ids, existing_dims)?;

        let next_ordinal: i64 = conn
            .query_row("SELECT COALESCE(MAX(ordinal) + 1, 0) FROM entries", [], |row| row.get(0))
            .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to read index ordinals", e))?;

        let tx = conn
            .transaction()
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to start index transaction", e))?;
        insert_rows(&tx, docs, &vectors, next_ordinal, &self.model)?;
        write_meta(&tx, META_EMBED_MODEL, &self.model)?;
        write_meta(&tx, META_DIMS, &dims.to_string())?;
        tx.commit()
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to commit index batch", e))?;

        tracing::info!(entries = docs.len(), "index batch added");
        Ok(docs.len())
    }

    /// Up to `k` entries matching `filter`, nearest first. Ties keep insertion order.
    pub fn query(&self, text: &str, k: usize, filter: &TagFilter) -> Result<Vec<Neighbor>, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::new("QUERY_INVALID_ARGUMENT", "Query text must not be empty"));
        }
        filter.validate()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        {
            let conn = self.conn()?;
            self.ensure_model_matches(&conn)?;
        }

        let qv = self.embedder.embed(&self.model, text.trim())?;
        if qv.is_empty() {
            return Err(AppError::new("EMBEDDINGS_FAILED", "Query embedding was empty"));
        }
        let qnorm = similarity::l2_norm(&qv);

        let rows = {
            let conn = self.conn()?;
            load_rows(&conn)?
        };

        let mut hits: Vec<(f32, i64, IndexEntry)> = Vec::new();
        for row in rows {
            let metadata = decode_metadata(&row)?;
            if !filter.matches(&metadata) {
                continue;
            }
            let v: Vec<f32> = serde_json::from_str(&row.embedding_json).map_err(|e| {
                AppError::new("INDEX_CORRUPT", "Failed to decode stored embedding")
                    .with_details(format!("id={}; err={}", row.id, e))
            })?;
            if v.len() != qv.len() {
                return Err(AppError::new(
                    "INDEX_DIMENSION_MISMATCH",
                    "Stored embedding dims do not match query dims",
                )
                .with_details(format!("id={}; stored={}; query={}", row.id, v.len(), qv.len())));
            }
            let d = similarity::distance(self.metric, &qv, qnorm, &v);
            if !d.is_finite() {
                tracing::warn!(id = %row.id, "skipping entry with non-finite distance");
                continue;
            }
            hits.push((
                d,
                row.ordinal,
                IndexEntry {
                    id: row.id,
                    document: row.document,
                    metadata,
                },
            ));
        }

        hits.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(distance, _, entry)| Neighbor { entry, distance })
            .collect())
    }

    /// Every entry matching `filter`, in insertion order.
    pub fn get(&self, filter: &TagFilter) -> Result<Vec<IndexEntry>, AppError> {
        filter.validate()?;
        let rows = {
            let conn = self.conn()?;
            load_rows(&conn)?
        };
        let mut out = Vec::new();
        for row in rows {
            let metadata = decode_metadata(&row)?;
            if filter.matches(&metadata) {
                out.push(IndexEntry {
                    id: row.id,
                    document: row.document,
                    metadata,
                });
            }
        }
        Ok(out)
    }

    fn ensure_model_matches(&self, conn: &Connection) -> Result<(), AppError> {
        if count_entries(conn)? == 0 {
            return Ok(());
        }
        match read_meta(conn, META_EMBED_MODEL)? {
            Some(m) if m != self.model => Err(AppError::new(
                "INDEX_MODEL_MISMATCH",
                "Index was built with a different embedding model; rebuild the index",
            )
            .with_details(format!("index_model={m}; configured_model={}", self.model))),
            _ => Ok(()),
        }
    }

    /// Embed `texts` in order, reusing and filling the persistent cache.
    /// The connection lock is not held while the embedder runs.
    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let keys: Vec<String> = texts.iter().map(|t| sha256_hex(t)).collect();

        let mut known: HashMap<String, Vec<f32>> = HashMap::new();
        {
            let conn = self.conn()?;
            let mut stmt = conn
                .prepare("SELECT embedding_json FROM embedding_cache WHERE model = ?1 AND text_sha256 = ?2")
                .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to prepare cache lookup", e))?;
            for key in keys.iter() {
                if known.contains_key(key) {
                    continue;
                }
                let hit: Option<String> = stmt
                    .query_row(params![self.model, key], |row| row.get(0))
                    .optional()
                    .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to read embedding cache", e))?;
                if let Some(json) = hit {
                    let v: Vec<f32> = serde_json::from_str(&json).map_err(|e| {
                        store_err("INDEX_CORRUPT", "Failed to decode cached embedding", e)
                    })?;
                    known.insert(key.clone(), v);
                }
            }
        }

        let mut fresh: Vec<(String, Vec<f32>)> = Vec::new();
        for (text, key) in texts.iter().zip(keys.iter()) {
            if known.contains_key(key) {
                continue;
            }
            let v = self.embedder.embed(&self.model, text).map_err(|e| {
                let details = format!("sha256={key}; err={e}");
                AppError::new(e.code.clone(), e.message.clone())
                    .with_details(details)
                    .with_retryable(e.retryable)
            })?;
            known.insert(key.clone(), v.clone());
            fresh.push((key.clone(), v));
        }
        tracing::debug!(texts = texts.len(), embedded = fresh.len(), "embeddings resolved");

        if !fresh.is_empty() {
            let mut conn = self.conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to start cache transaction", e))?;
            for (key, v) in fresh.iter() {
                let json = serde_json::to_string(v)
                    .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to encode embedding", e))?;
                tx.execute(
                    "INSERT OR REPLACE INTO embedding_cache(model, text_sha256, embedding_json) VALUES (?1, ?2, ?3)",
                    params![self.model, key, json],
                )
                .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to write embedding cache", e))?;
            }
            tx.commit()
                .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to commit embedding cache", e))?;
        }

        keys.iter()
            .map(|k| {
                known.get(k).cloned().ok_or_else(|| {
                    AppError::new("INDEX_CORRUPT", "Embedding missing after resolution")
                        .with_details(format!("sha256={k}"))
                })
            })
            .collect()
    }
}

/// Drop cached vectors that no entry of the new full set uses, including other models'.
fn prune_cache(conn: &Connection, model: &str, documents: &[String]) -> Result<usize, AppError> {
    let live: Vec<String> = documents.iter().map(|d| sha256_hex(d)).collect();
    let live_json = serde_json::to_string(&live)
        .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to encode live cache keys", e))?;
    conn.execute(
        "DELETE FROM embedding_cache
         WHERE model <> ?1
            OR text_sha256 NOT IN (SELECT value FROM json_each(?2))",
        params![model, live_json],
    )
    .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to prune embedding cache", e))
}

fn validate_batch(docs: &PreparedDocuments) -> Result<(), AppError> {
    if docs.documents.len() != docs.ids.len() || docs.metadatas.len() != docs.ids.len() {
        return Err(AppError::new(
            "DATASET_INVALID",
            "Documents, metadatas and ids must have equal length",
        )
        .with_details(format!(
            "documents={}; metadatas={}; ids={}",
            docs.documents.len(),
            docs.metadatas.len(),
            docs.ids.len()
        )));
    }
    let mut seen = BTreeSet::new();
    for id in docs.ids.iter() {
        if id.trim().is_empty() {
            return Err(AppError::new("DATASET_INVALID", "Entry identifier must not be empty"));
        }
        if !seen.insert(id.as_str()) {
            return Err(AppError::new("DATASET_DUPLICATE_ID", "Entry identifier repeated in batch")
                .with_details(format!("id={id}")));
        }
    }
    Ok(())
}

fn uniform_dims(vectors: &[Vec<f32>], ids: &[String], expected: Option<usize>) -> Result<usize, AppError> {
    let mut dims = expected;
    for (v, id) in vectors.iter().zip(ids.iter()) {
        if v.is_empty() {
            return Err(AppError::new("EMBEDDINGS_FAILED", "Embedding was empty")
                .with_details(format!("id={id}")));
        }
        match dims {
            Some(d) if d != v.len() => {
                return Err(AppError::new(
                    "INDEX_DIMENSION_MISMATCH",
                    "Embedding dimension mismatch across entries",
                )
                .with_details(format!("expected={d}; got={}; id={id}", v.len())));
            }
            Some(_) => {}
            None => dims = Some(v.len()),
        }
    }
    dims.ok_or_else(|| AppError::new("EMBEDDINGS_FAILED", "No embeddings computed"))
}

fn insert_rows(
    conn: &Connection,
    docs: &PreparedDocuments,
    vectors: &[Vec<f32>],
    first_ordinal: i64,
    model: &str,
) -> Result<(), AppError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO entries(id, ordinal, document, metadata_json, embedding_json, model) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to prepare entry insert", e))?;
    for (i, v) in vectors.iter().enumerate() {
        let meta_json = serde_json::to_string(&docs.metadatas[i])
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to encode entry metadata", e))?;
        let emb_json = serde_json::to_string(v)
            .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to encode entry embedding", e))?;
        stmt.execute(params![
            docs.ids[i],
            first_ordinal + i as i64,
            docs.documents[i],
            meta_json,
            emb_json,
            model
        ])
        .map_err(|e| {
            AppError::new("INDEX_WRITE_FAILED", "Failed to insert index entry")
                .with_details(format!("id={}; err={}", docs.ids[i], e))
        })?;
    }
    Ok(())
}

fn count_entries(conn: &Connection) -> Result<usize, AppError> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
        .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to count index entries", e))?;
    Ok(n as usize)
}

fn entry_exists(conn: &Connection, id: &str) -> Result<bool, AppError> {
    conn.query_row("SELECT 1 FROM entries WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .map(|r| r.is_some())
        .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to look up index entry", e))
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    conn.query_row("SELECT value FROM index_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to read index metadata", e))
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO index_meta(key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map(|_| ())
    .map_err(|e| store_err("INDEX_WRITE_FAILED", "Failed to write index metadata", e))
}

fn load_rows(conn: &Connection) -> Result<Vec<StoredRow>, AppError> {
    let mut stmt = conn
        .prepare("SELECT id, ordinal, document, metadata_json, embedding_json FROM entries ORDER BY ordinal ASC")
        .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to prepare entry scan", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                ordinal: row.get(1)?,
                document: row.get(2)?,
                metadata_json: row.get(3)?,
                embedding_json: row.get(4)?,
            })
        })
        .map_err(|e| store_err("INDEX_READ_FAILED", "Failed to scan index entries", e))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| store_err("INDEX_READ_FAILED", "Failed to read index entry row", e))?);
    }
    Ok(out)
}

fn decode_metadata(row: &StoredRow) -> Result<Metadata, AppError> {
    serde_json::from_str(&row.metadata_json).map_err(|e| {
        AppError::new("INDEX_CORRUPT", "Failed to decode entry metadata")
            .with_details(format!("id={}; err={}", row.id, e))
    })
}
