use std::fmt::Write as _;

use lc_core::domain::{tags, ContentType, Metadata};
use lc_core::error::AppError;
use serde::{Deserialize, Serialize};

use crate::index::{IndexStore, TagFilter};

/// Candidates requested per wanted result, leaving room for threshold filtering.
pub const DEFAULT_OVERSAMPLE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Results scoring at or below this value are dropped.
    pub similarity_threshold: Option<f32>,
    pub include_derivatives: bool,
    pub oversample: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 5,
            similarity_threshold: None,
            include_derivatives: true,
            oversample: DEFAULT_OVERSAMPLE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    /// In `[0, 1]`; 1.0 is the best match of the candidate batch.
    pub score: f32,
}

/// Map raw distances onto `[0, 1]` relative to the largest distance in the batch.
///
/// Scores are only comparable within one batch. Equal distances all score 1.0.
pub fn normalize_scores(distances: &[f32]) -> Vec<f32> {
    let Some(max) = distances.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let min = distances.iter().copied().fold(max, f32::min);
    if max == min || max <= 0.0 {
        return vec![1.0; distances.len()];
    }
    distances
        .iter()
        .map(|d| (1.0 - d / max).clamp(0.0, 1.0))
        .collect()
}

/// Ranked dialogue/statement entries for a free-text query.
///
/// Returns at most `max_results` results; an empty list means nothing matched.
/// Store or embedding failures are returned as errors, never as an empty list.
pub fn search(index: &IndexStore, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>, AppError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new("QUERY_INVALID_ARGUMENT", "Query must not be empty"));
    }
    if let Some(t) = opts.similarity_threshold {
        if !t.is_finite() {
            return Err(AppError::new(
                "QUERY_INVALID_ARGUMENT",
                "Similarity threshold must be a finite number",
            )
            .with_details(format!("similarity_threshold={t}")));
        }
    }
    if opts.max_results == 0 {
        return Ok(Vec::new());
    }

    let mut filter = TagFilter::new().eq(tags::CONTENT_TYPE, ContentType::DialogueOrStatement);
    if !opts.include_derivatives {
        filter = filter.eq(tags::IS_DERIVATIVE, false);
    }
    let wanted = opts
        .max_results
        .saturating_mul(opts.oversample.max(1));

    let neighbors = index.query(q, wanted, &filter)?;
    let distances: Vec<f32> = neighbors.iter().map(|n| n.distance).collect();
    let scores = normalize_scores(&distances);

    let mut ranked: Vec<SearchResult> = neighbors
        .into_iter()
        .zip(scores)
        .map(|(n, score)| SearchResult {
            id: n.entry.id,
            content: n.entry.document,
            metadata: n.entry.metadata,
            score,
        })
        .collect();
    let candidates = ranked.len();

    // Stable sort keeps retrieval order among equal scores.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    if let Some(t) = opts.similarity_threshold {
        ranked.retain(|r| r.score > t);
    }
    ranked.truncate(opts.max_results);

    tracing::debug!(candidates, returned = ranked.len(), "search finished");
    Ok(ranked)
}

/// Human-readable rendering of search results.
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No matching questions found.".to_string();
    }
    let mut out = String::new();
    for (idx, r) in results.iter().enumerate() {
        let _ = writeln!(out, "Result {}: {} (score {:.4})", idx + 1, r.id, r.score);
        for (key, value) in r.metadata.iter() {
            if key == tags::CONTENT_TYPE {
                continue;
            }
            let _ = writeln!(out, "  {key}: {value}");
        }
        for line in r.content.lines() {
            let _ = writeln!(out, "  | {line}");
        }
    }
    out
}
