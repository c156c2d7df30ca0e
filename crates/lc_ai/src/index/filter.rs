use std::collections::BTreeMap;

use lc_core::domain::{Metadata, MetaValue};
use lc_core::error::AppError;

/// Exact-match constraint on metadata tags. Every key must be present and equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeMap<String, MetaValue>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for key in self.tags.keys() {
            let ok = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
            if !ok {
                return Err(AppError::new("QUERY_INVALID_FILTER", "Filter tag key is malformed")
                    .with_details(format!("key={key:?}")));
            }
        }
        Ok(())
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.tags
            .iter()
            .all(|(k, v)| metadata.get(k).is_some_and(|m| m == v))
    }
}
