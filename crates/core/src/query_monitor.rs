//! Query Monitor: pure functions over database events.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use runtimescope_types::{
    DatabaseEventFields, DbOperation, DetectedIssue, IndexImpact, IndexSuggestion, NormalizedQueryStats, RuntimeEvent,
    Severity,
};

use crate::stats::{group_by_ordered, mean, percentile, sliding_window_segments, wire_str};

const N1_WINDOW_MS: i64 = 2000;
const N1_THRESHOLD: usize = 5;
const SLOW_QUERY_THRESHOLD_MS: f64 = 500.0;

fn where_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)WHERE\s+.*?["'`]?(\w+)["'`]?\s*(=|>|<|>=|<=|!=|LIKE|IN|IS)\s"#).unwrap())
}

fn order_by_column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)ORDER\s+BY\s+["'`]?(\w+)["'`]?"#).unwrap())
}

fn star_select_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)SELECT\s+\*").unwrap())
}

fn db_fields(event: &RuntimeEvent) -> Option<&DatabaseEventFields> {
    match event {
        RuntimeEvent::Database(f) => Some(f),
        _ => None,
    }
}

fn database_refs(events: &[RuntimeEvent]) -> Vec<&RuntimeEvent> {
    events.iter().filter(|e| matches!(e, RuntimeEvent::Database(_))).collect()
}

/// Group by `normalizedQuery`; per group compute aggregate duration/row
/// stats. Sorted by `totalDuration` descending.
pub fn aggregate_query_stats(events: &[RuntimeEvent]) -> Vec<NormalizedQueryStats> {
    let refs = database_refs(events);
    let mut stats: Vec<NormalizedQueryStats> = group_by_ordered(&refs, |e| db_fields(e).unwrap().normalized_query.clone())
        .into_iter()
        .map(|(normalized_query, group)| {
            let mut tables = Vec::new();
            for e in &group {
                for table in &db_fields(e).unwrap().tables_accessed {
                    if !tables.contains(table) {
                        tables.push(table.clone());
                    }
                }
            }
            let operation = wire_str(&db_fields(group[0]).unwrap().operation);
            let mut durations: Vec<f64> = group.iter().map(|e| db_fields(e).unwrap().duration).collect();
            durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let rows: Vec<f64> = group
                .iter()
                .filter_map(|e| db_fields(e).unwrap().rows_returned)
                .map(|r| r as f64)
                .collect();

            NormalizedQueryStats {
                normalized_query,
                tables,
                operation,
                call_count: group.len() as u64,
                avg_duration: mean(&durations),
                max_duration: durations.last().copied().unwrap_or(0.0),
                p95_duration: percentile(&durations, 95.0),
                total_duration: durations.iter().sum(),
                avg_rows_returned: mean(&rows),
            }
        })
        .collect();

    stats.sort_by(|a, b| b.total_duration.partial_cmp(&a.total_duration).unwrap_or(std::cmp::Ordering::Equal));
    stats
}

fn make_issue(
    pattern: &str,
    key: &str,
    severity: Severity,
    title: impl Into<String>,
    description: impl Into<String>,
    evidence: &[&RuntimeEvent],
    suggestion: Option<String>,
) -> DetectedIssue {
    DetectedIssue {
        id: format!("{pattern}:{key}"),
        pattern: pattern.to_string(),
        severity,
        title: title.into(),
        description: description.into(),
        evidence: evidence
            .iter()
            .map(|e| serde_json::to_value(e).unwrap_or(serde_json::Value::Null))
            .collect(),
        suggestion,
    }
}

/// Groups SELECT events by each accessed table (an event with multiple
/// tables contributes to every table's group); each group is scanned with a
/// 2-second sliding window, advancing past every triggering window so
/// overlapping windows don't double-report.
pub fn detect_n1_queries(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let selects: Vec<&RuntimeEvent> =
        database_refs(events).into_iter().filter(|e| db_fields(e).unwrap().operation == DbOperation::Select).collect();

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&RuntimeEvent>> = HashMap::new();
    for event in selects {
        for table in &db_fields(event).unwrap().tables_accessed {
            if !groups.contains_key(table) {
                order.push(table.clone());
            }
            groups.entry(table.clone()).or_default().push(event);
        }
    }

    let mut issues = Vec::new();
    for table in order {
        let mut group = groups.remove(&table).unwrap_or_default();
        group.sort_by_key(|e| e.timestamp());
        let timestamps: Vec<i64> = group.iter().map(|e| e.timestamp()).collect();
        for (idx, (start, end)) in sliding_window_segments(&timestamps, N1_WINDOW_MS, N1_THRESHOLD).into_iter().enumerate() {
            let window = &group[start..=end];
            issues.push(make_issue(
                "n1_db_queries",
                &format!("{table}:{idx}"),
                Severity::High,
                format!("Possible N+1 queries on {table}"),
                format!("{} SELECTs against {table} within a short window", window.len()),
                &window.iter().take(5).copied().collect::<Vec<_>>(),
                Some("Use a join or batched fetch instead of per-row queries".to_string()),
            ));
        }
    }
    issues
}

/// One issue per unique `normalizedQuery` with any event at or above
/// `threshold`ms; severity `high` if `duration > 2000` else `medium`.
pub fn detect_slow_queries(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    detect_slow_queries_with_threshold(events, SLOW_QUERY_THRESHOLD_MS)
}

pub fn detect_slow_queries_with_threshold(events: &[RuntimeEvent], threshold: f64) -> Vec<DetectedIssue> {
    let slow: Vec<&RuntimeEvent> = database_refs(events).into_iter().filter(|e| db_fields(e).unwrap().duration >= threshold).collect();

    group_by_ordered(&slow, |e| db_fields(e).unwrap().normalized_query.clone())
        .into_iter()
        .map(|(key, group)| {
            let max_duration = group.iter().map(|e| db_fields(e).unwrap().duration).fold(0.0_f64, f64::max);
            let severity = if max_duration > 2000.0 { Severity::High } else { Severity::Medium };
            let evidence: Vec<&RuntimeEvent> = group.iter().take(5).copied().collect();
            make_issue(
                "slow_db_queries",
                &key,
                severity,
                "Slow database query",
                format!("{} executed {} time(s), up to {max_duration:.0}ms", key, group.len()),
                &evidence,
                Some("Add an index or reduce the result set".to_string()),
            )
        })
        .collect()
}

/// Events with `duration >= 100`; extracts WHERE/ORDER BY column candidates
/// via regex over the raw `query`, dedupes by `table:sortedColumns`.
pub fn suggest_indexes(events: &[RuntimeEvent]) -> Vec<IndexSuggestion> {
    let candidates: Vec<&RuntimeEvent> = database_refs(events).into_iter().filter(|e| db_fields(e).unwrap().duration >= 100.0).collect();

    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut suggestions = Vec::new();

    for event in candidates {
        let fields = db_fields(event).unwrap();
        let mut columns: Vec<String> = where_column_re()
            .captures_iter(&fields.query)
            .map(|c| c[1].to_string())
            .collect();
        columns.extend(order_by_column_re().captures_iter(&fields.query).map(|c| c[1].to_string()));
        if columns.is_empty() {
            continue;
        }
        columns.sort();
        columns.dedup();
        let impact = if fields.duration > 1000.0 {
            IndexImpact::High
        } else if fields.duration > 300.0 {
            IndexImpact::Medium
        } else {
            IndexImpact::Low
        };

        for table in &fields.tables_accessed {
            let dedupe_key = format!("{table}:{}", columns.join(","));
            if seen.insert(dedupe_key, ()).is_some() {
                continue;
            }
            suggestions.push(IndexSuggestion {
                table: table.clone(),
                columns: columns.clone(),
                sample_query: fields.query.clone(),
                duration: fields.duration,
                estimated_impact: impact,
            });
        }
    }

    suggestions
}

/// SELECT events matching `/SELECT\s+\*/i` with `rowsReturned > 100`,
/// deduped by `normalizedQuery`.
pub fn detect_overfetching(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let candidates: Vec<&RuntimeEvent> = database_refs(events)
        .into_iter()
        .filter(|e| {
            let f = db_fields(e).unwrap();
            f.operation == DbOperation::Select && star_select_re().is_match(&f.query) && f.rows_returned.unwrap_or(0) > 100
        })
        .collect();

    group_by_ordered(&candidates, |e| db_fields(e).unwrap().normalized_query.clone())
        .into_iter()
        .map(|(key, group)| {
            let rows = db_fields(group[0]).unwrap().rows_returned.unwrap_or(0);
            let severity = if rows > 1000 { Severity::High } else { Severity::Medium };
            let evidence: Vec<&RuntimeEvent> = group.iter().take(3).copied().collect();
            make_issue(
                "overfetching",
                &key,
                severity,
                "Overfetching query",
                format!("{key} returned {rows} rows with SELECT *"),
                &evidence,
                Some("Select only the columns you need".to_string()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_types::EventHeader;

    fn db_event(event_id: &str, ts: i64, query: &str, normalized: &str, duration: f64, table: &str, op: DbOperation) -> RuntimeEvent {
        RuntimeEvent::Database(DatabaseEventFields {
            header: EventHeader {
                event_id: event_id.into(),
                session_id: "s1".into(),
                timestamp: ts,
            },
            query: query.into(),
            normalized_query: normalized.into(),
            duration,
            rows_returned: Some(5),
            rows_affected: None,
            tables_accessed: vec![table.into()],
            operation: op,
            source: runtimescope_types::DbSource::Generic,
            error: None,
            label: None,
            stack_trace: None,
            params: None,
        })
    }

    #[test]
    fn aggregate_sorts_by_total_duration_desc() {
        let events = vec![
            db_event("e1", 0, "SELECT * FROM a", "SELECT * FROM a", 10.0, "a", DbOperation::Select),
            db_event("e2", 1, "SELECT * FROM b WHERE id = ?", "SELECT * FROM b WHERE id = ?", 500.0, "b", DbOperation::Select),
        ];
        let stats = aggregate_query_stats(&events);
        assert_eq!(stats[0].normalized_query, "SELECT * FROM b WHERE id = ?");
    }

    #[test]
    fn n1_queries_trigger_on_dense_select_burst() {
        let events: Vec<RuntimeEvent> = (0..8)
            .map(|i| db_event(&format!("e{i}"), i * 100, "SELECT * FROM orders WHERE user_id = ?", "q", 5.0, "orders", DbOperation::Select))
            .collect();
        let issues = detect_n1_queries(&events);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn suggest_indexes_extracts_where_column() {
        let events = vec![db_event(
            "e1",
            0,
            "SELECT * FROM users WHERE email = 'x'",
            "SELECT * FROM users WHERE email = ?",
            150.0,
            "users",
            DbOperation::Select,
        )];
        let suggestions = suggest_indexes(&events);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].columns, vec!["email".to_string()]);
        assert_eq!(suggestions[0].estimated_impact, IndexImpact::Low);
    }

    #[test]
    fn overfetching_requires_rows_over_100() {
        let mut event = db_event("e1", 0, "SELECT * FROM logs", "SELECT * FROM logs", 20.0, "logs", DbOperation::Select);
        if let RuntimeEvent::Database(f) = &mut event {
            f.rows_returned = Some(500);
        }
        let issues = detect_overfetching(&[event]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);
    }
}
