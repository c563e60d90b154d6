//! Filter contract shared by every `EventStore` typed query.
//!
//! All fields are AND-composed. String fields use case-insensitive substring
//! match for `url_pattern`/`search`/`table`/`component_name`; exact match
//! (method upper-cased on both sides) for `status`/`method`/`level`/
//! `store_id`/`metric_name`/`operation`/`source`. `min_duration_ms` is `>=`.

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub since_seconds: Option<i64>,
    pub url_pattern: Option<String>,
    pub status: Option<u16>,
    pub method: Option<String>,
    pub search: Option<String>,
    pub level: Option<String>,
    pub min_duration_ms: Option<f64>,
    pub store_id: Option<String>,
    pub component_name: Option<String>,
    pub metric_name: Option<String>,
    pub operation: Option<String>,
    pub source: Option<String>,
    pub table: Option<String>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn cutoff(&self, now_ms: i64) -> Option<i64> {
        self.since_seconds.map(|s| now_ms - s * 1000)
    }

    pub fn timestamp_ok(&self, timestamp: i64, now_ms: i64) -> bool {
        match self.cutoff(now_ms) {
            Some(cutoff) => timestamp >= cutoff,
            None => true,
        }
    }

    pub fn substring_ok(needle: &Option<String>, haystack: &str) -> bool {
        match needle {
            Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
            None => true,
        }
    }

    pub fn exact_ok(needle: &Option<String>, value: &str) -> bool {
        match needle {
            Some(n) => n.eq_ignore_ascii_case(value),
            None => true,
        }
    }
}

/// Filter for the Persistent Log's `getEvents`/`getEventCount`. Unlike
/// `EventFilter` this is scoped to a project and supports an explicit
/// `[since, until]` range plus pagination rather than a rolling window.
#[derive(Debug, Clone)]
pub struct EventLogFilter {
    pub project: String,
    pub session_id: Option<String>,
    pub event_types: Option<Vec<String>>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: u64,
    pub offset: u64,
}

impl EventLogFilter {
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            session_id: None,
            event_types: None,
            since: None,
            until: None,
            limit: 100,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_none_without_since_seconds() {
        let filter = EventFilter::default();
        assert_eq!(filter.cutoff(1_000_000), None);
        assert!(filter.timestamp_ok(0, 1_000_000));
    }

    #[test]
    fn cutoff_excludes_older_timestamps() {
        let filter = EventFilter {
            since_seconds: Some(10),
            ..Default::default()
        };
        assert!(!filter.timestamp_ok(0, 20_000));
        assert!(filter.timestamp_ok(11_000, 20_000));
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let needle = Some("Api".to_string());
        assert!(EventFilter::substring_ok(&needle, "https://API.example.com"));
        assert!(!EventFilter::substring_ok(&needle, "https://example.com"));
    }
}
