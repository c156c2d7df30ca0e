use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the library crates and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

/// Coarse classification of an [`AppError`] derived from its code family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or incomplete source dataset.
    DataIntegrity,
    /// Index store, embedding service or LLM could not be used.
    BackendUnavailable,
    /// Malformed filter or query argument.
    Query,
    Config,
    Generation,
    Other,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        let code = self.code.as_str();
        if code.starts_with("DATASET_") {
            ErrorKind::DataIntegrity
        } else if ["INDEX_", "DB_", "EMBEDDINGS_", "LLM_", "OLLAMA_"]
            .iter()
            .any(|p| code.starts_with(p))
        {
            ErrorKind::BackendUnavailable
        } else if code.starts_with("QUERY_") {
            ErrorKind::Query
        } else if code.starts_with("CONFIG_") {
            ErrorKind::Config
        } else if code.starts_with("GENERATION_") {
            ErrorKind::Generation
        } else {
            ErrorKind::Other
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = self.details.as_deref() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
