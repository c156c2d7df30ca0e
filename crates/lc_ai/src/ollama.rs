use std::time::Duration;

use lc_core::error::AppError;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for a local Ollama instance (`127.0.0.1` or `localhost` only).
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let rest = base_url.strip_prefix("http://").ok_or_else(|| {
            AppError::new("OLLAMA_REMOTE_NOT_ALLOWED", "Ollama base URL must use http://")
                .with_details(format!("base_url={base_url}"))
        })?;
        let (host, port) = match rest.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (rest, None),
        };
        if host != "127.0.0.1" && host != "localhost" {
            return Err(AppError::new(
                "OLLAMA_REMOTE_NOT_ALLOWED",
                "Ollama base URL must point at the local machine",
            )
            .with_details(format!("base_url={base_url}")));
        }
        if let Some(p) = port {
            let valid = !p.is_empty()
                && p.chars().all(|c| c.is_ascii_digit())
                && matches!(p.parse::<u16>(), Ok(n) if n > 0);
            if !valid {
                return Err(AppError::new("OLLAMA_REMOTE_NOT_ALLOWED", "Ollama base URL has an invalid port")
                    .with_details(format!("base_url={base_url}")));
            }
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url).timeout(Duration::from_millis(800)).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(ureq::Error::Status(status, _)) => Err(
                AppError::new("OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={status}")),
            ),
            Err(e) => Err(AppError::new("OLLAMA_UNREACHABLE", "Failed to reach local Ollama")
                .with_details(e.to_string())
                .with_retryable(true)),
        }
    }
}
