use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use lc_core::error::AppError;

/// Decides whether the index must be rebuilt from the source dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessTracker {
    last_indexed: Option<OffsetDateTime>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_last_indexed(last_indexed: Option<OffsetDateTime>) -> Self {
        Self { last_indexed }
    }

    pub fn last_indexed(&self) -> Option<OffsetDateTime> {
        self.last_indexed
    }

    /// True when the store is empty, nothing was recorded yet, or the source is newer.
    pub fn needs_update(&self, store_count: usize, source_mtime: OffsetDateTime) -> bool {
        if store_count == 0 {
            return true;
        }
        match self.last_indexed {
            None => true,
            Some(last) => source_mtime > last,
        }
    }

    /// Call only after a full rebuild succeeded.
    pub fn record(&mut self, source_mtime: OffsetDateTime) {
        self.last_indexed = Some(source_mtime);
    }
}

pub fn format_timestamp(ts: OffsetDateTime) -> Result<String, AppError> {
    ts.format(&Rfc3339).map_err(|e| {
        AppError::new("INDEX_META_INVALID", "Failed to format index timestamp").with_details(e.to_string())
    })
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| {
        AppError::new("INDEX_META_INVALID", "Failed to parse index timestamp")
            .with_details(format!("value={raw}; err={e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn empty_store_always_needs_update() {
        let mut tracker = FreshnessTracker::new();
        tracker.record(t0() + Duration::days(1));
        assert!(tracker.needs_update(0, t0()));
    }

    #[test]
    fn no_prior_timestamp_needs_update() {
        assert!(FreshnessTracker::new().needs_update(10, t0()));
    }

    #[test]
    fn fresh_after_record_with_same_mtime() {
        let mut tracker = FreshnessTracker::new();
        tracker.record(t0());
        assert!(!tracker.needs_update(10, t0()));
        assert!(!tracker.needs_update(10, t0() - Duration::seconds(5)));
        assert!(tracker.needs_update(10, t0() + Duration::nanoseconds(1)));
    }

    #[test]
    fn timestamps_survive_text_round_trip_with_subsecond_precision() {
        let ts = t0() + Duration::nanoseconds(123_456_789);
        let parsed = parse_timestamp(&format_timestamp(ts).unwrap()).unwrap();
        assert_eq!(parsed, ts);
    }
}
