use lc_core::error::AppError;

/// Opaque text completion: prompt in, text out.
pub trait Llm: Send + Sync {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

pub mod ollama_llm;

/// Strip Markdown code fences around a JSON reply; returns the trimmed inner text.
pub fn extract_json_block(response: &str) -> &str {
    if let Some((_, rest)) = response.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    let mut fenced = response.split("```");
    if let (Some(_), Some(inner)) = (fenced.next(), fenced.next()) {
        return inner.trim();
    }
    response.trim()
}

#[cfg(test)]
mod tests {
    use super::extract_json_block;

    #[test]
    fn strips_json_fence() {
        assert_eq!(extract_json_block("Hier:\n```json\n{\"a\":1}\n```\nDanke"), "{\"a\":1}");
    }

    #[test]
    fn strips_plain_fence() {
        assert_eq!(extract_json_block("```\n[1,2]\n```"), "[1,2]");
    }

    #[test]
    fn leaves_bare_json() {
        assert_eq!(extract_json_block("  {\"a\":1} "), "{\"a\":1}");
    }
}
