//! TOML configuration for the listening-comprehension index.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    L2,
    /// `1 - cosine similarity`.
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default = "default_oversample")]
    pub oversample: usize,
    #[serde(default = "default_metric")]
    pub metric: DistanceMetric,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("data/questions.json")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}
fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_embed_model() -> String {
    "paraphrase-multilingual".to_string()
}
fn default_llm_model() -> String {
    "llama3.1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_results() -> usize {
    5
}
fn default_oversample() -> usize {
    10
}
fn default_metric() -> DistanceMetric {
    DistanceMetric::L2
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            llm_model: default_llm_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            similarity_threshold: None,
            oversample: default_oversample(),
            metric: default_metric(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            index_dir: default_index_dir(),
            ollama: OllamaConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let cfg = Self::from_toml(&raw)?;
        // Relative paths in the file are resolved against the file's directory.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(cfg.resolve_relative_to(base))
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        let cfg: Self = toml::from_str(raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to parse config file").with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.dataset_path.is_relative() {
            self.dataset_path = base.join(&self.dataset_path);
        }
        if self.index_dir.is_relative() {
            self.index_dir = base.join(&self.index_dir);
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.search.max_results == 0 {
            return Err(AppError::new("CONFIG_INVALID", "search.max_results must be at least 1"));
        }
        if self.search.oversample == 0 {
            return Err(AppError::new("CONFIG_INVALID", "search.oversample must be at least 1"));
        }
        if let Some(t) = self.search.similarity_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(AppError::new(
                    "CONFIG_INVALID",
                    "search.similarity_threshold must lie in [0, 1]",
                )
                .with_details(format!("similarity_threshold={t}")));
            }
        }
        if self.ollama.embed_model.trim().is_empty() || self.ollama.llm_model.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "Model names must not be empty"));
        }
        if self.ollama.timeout_secs == 0 {
            return Err(AppError::new("CONFIG_INVALID", "ollama.timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = AppConfig::from_toml("").expect("parse");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.search.metric, DistanceMetric::L2);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            index_dir = "/var/lib/hoeren"
            [search]
            max_results = 3
            similarity_threshold = 0.25
            metric = "cosine"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.index_dir, PathBuf::from("/var/lib/hoeren"));
        assert_eq!(cfg.search.max_results, 3);
        assert_eq!(cfg.search.oversample, 10);
        assert_eq!(cfg.search.metric, DistanceMetric::Cosine);
        assert_eq!(cfg.ollama.embed_model, "paraphrase-multilingual");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = AppConfig::from_toml("[search]\nsimilarity_threshold = 1.5").unwrap_err();
        assert_eq!(err.code, "CONFIG_INVALID");
    }
}
