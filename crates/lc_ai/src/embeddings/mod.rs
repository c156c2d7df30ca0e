use lc_core::error::AppError;

/// Text → fixed-length vector. Implementations must be deterministic for a given model.
pub trait Embedder: Send + Sync {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;
