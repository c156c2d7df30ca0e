pub mod derivatives;
pub mod embeddings;
pub mod freshness;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
pub mod retrieve;
pub mod scenario;
pub mod structure;
pub mod topics;
