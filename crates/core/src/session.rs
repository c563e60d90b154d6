//! Session Manager & Differ: per-session metric aggregation and
//! before/after comparison.

use std::collections::HashMap;

use runtimescope_types::{
    ComponentMetrics, DeltaClassification, EndpointMetrics, MetricDelta, QueryMetrics, RuntimeEvent, SessionComparison,
    SessionMetrics, StoreMetrics, WebVitalMetrics,
};

use crate::discovery::normalize_url;
use crate::stats::mean;

/// The minimum relative change (kept at 10%)
/// below which a delta is classified `unchanged` rather than a regression
/// or improvement.
const CHANGE_THRESHOLD: f64 = 0.10;

/// Rebuilds `SessionMetrics` from scratch over every event belonging to
/// `session_id`. Endpoint keys are `"METHOD baseUrl normalizedPath"`,
/// matching the catalog key used by the discovery engine.
pub fn compute_metrics(session_id: &str, project: &str, events: &[RuntimeEvent]) -> SessionMetrics {
    let _ = project;
    let mut metrics = SessionMetrics {
        session_id: session_id.to_string(),
        ..Default::default()
    };

    let mut endpoint_durations: HashMap<String, (f64, u64, u64)> = HashMap::new(); // sum, count, errors
    let mut component_durations: HashMap<String, (f64, u32)> = HashMap::new();
    let mut store_updates: HashMap<String, u32> = HashMap::new();
    let mut query_durations: HashMap<String, (f64, u64)> = HashMap::new();

    for event in events {
        if event.session_id() != session_id {
            continue;
        }
        metrics.total_events += 1;

        match event {
            RuntimeEvent::Network(f) => {
                let (base_url, normalized_path) = normalize_url(&f.url);
                let key = format!("{} {} {}", f.method.to_uppercase(), base_url, normalized_path);
                let entry = endpoint_durations.entry(key).or_insert((0.0, 0, 0));
                entry.0 += f.duration.unwrap_or(0.0);
                entry.1 += 1;
                if f.status.map(|s| s >= 400).unwrap_or(false) {
                    entry.2 += 1;
                    metrics.error_count += 1;
                }
            }
            RuntimeEvent::Console(f) => {
                if f.level == runtimescope_types::ConsoleLevel::Error {
                    metrics.error_count += 1;
                }
            }
            RuntimeEvent::Render(f) => {
                for profile in &f.profiles {
                    let entry = component_durations.entry(profile.component_name.clone()).or_insert((0.0, 0));
                    entry.0 += profile.total_duration;
                    entry.1 += profile.render_count;
                }
            }
            RuntimeEvent::State(f) => {
                if f.phase == runtimescope_types::StatePhase::Update {
                    *store_updates.entry(f.store_id.clone()).or_insert(0) += 1;
                }
            }
            RuntimeEvent::Performance(f) => {
                let rating_str = match f.rating {
                    Some(runtimescope_types::VitalRating::Good) => "good",
                    Some(runtimescope_types::VitalRating::NeedsImprovement) => "needs-improvement",
                    Some(runtimescope_types::VitalRating::Poor) => "poor",
                    None => "unknown",
                };
                metrics.web_vitals.insert(
                    f.metric_name.clone(),
                    WebVitalMetrics {
                        value: f.value,
                        rating: rating_str.to_string(),
                    },
                );
            }
            RuntimeEvent::Database(f) => {
                let entry = query_durations.entry(f.normalized_query.clone()).or_insert((0.0, 0));
                entry.0 += f.duration;
                entry.1 += 1;
                if f.error.is_some() {
                    metrics.error_count += 1;
                }
            }
            _ => {}
        }
    }

    metrics.endpoints = endpoint_durations
        .into_iter()
        .map(|(key, (sum, count, errors))| {
            (
                key,
                EndpointMetrics {
                    avg_latency: if count > 0 { sum / count as f64 } else { 0.0 },
                    error_rate: if count > 0 { errors as f64 / count as f64 } else { 0.0 },
                    call_count: count,
                },
            )
        })
        .collect();

    metrics.components = component_durations
        .into_iter()
        .map(|(name, (sum, count))| {
            (
                name,
                ComponentMetrics {
                    render_count: count,
                    avg_duration: if count > 0 { sum / count as f64 } else { 0.0 },
                },
            )
        })
        .collect();

    metrics.stores = store_updates
        .into_iter()
        .map(|(id, count)| (id, StoreMetrics { update_count: count }))
        .collect();

    metrics.queries = query_durations
        .into_iter()
        .map(|(query, (sum, count))| {
            (
                query,
                QueryMetrics {
                    avg_duration: if count > 0 { sum / count as f64 } else { 0.0 },
                    call_count: count,
                },
            )
        })
        .collect();

    if let (Some(first), Some(last)) = (
        events.iter().filter(|e| e.session_id() == session_id).map(|e| e.timestamp()).min(),
        events.iter().filter(|e| e.session_id() == session_id).map(|e| e.timestamp()).max(),
    ) {
        metrics.connected_at = first;
        metrics.disconnected_at = last;
    }

    metrics
}

fn classify(percent_change: f64) -> DeltaClassification {
    if percent_change.abs() < CHANGE_THRESHOLD * 100.0 {
        DeltaClassification::Unchanged
    } else if percent_change > 0.0 {
        DeltaClassification::Regression
    } else {
        DeltaClassification::Improvement
    }
}

fn metric_delta(key: &str, before: f64, after: f64) -> MetricDelta {
    let delta = after - before;
    let percent_change = if before == 0.0 {
        if after == 0.0 { 0.0 } else { 100.0 }
    } else {
        (delta / before) * 100.0
    };
    MetricDelta {
        key: key.to_string(),
        before,
        after,
        delta,
        percent_change,
        classification: classify(percent_change),
    }
}

/// Diffs every metric key present in either `a` or `b`. Keys present in
/// only one session compare against a zero baseline on the missing side.
/// Component averages for a key seen in both sessions are the mean of the
/// two averages — preserved verbatim from the pre-existing behavior rather
/// than reweighted by render count.
pub fn compare_sessions(a: &SessionMetrics, b: &SessionMetrics) -> SessionComparison {
    let mut endpoint_keys: Vec<&String> = a.endpoints.keys().collect();
    for key in b.endpoints.keys() {
        if !endpoint_keys.contains(&key) {
            endpoint_keys.push(key);
        }
    }
    let endpoint_deltas = endpoint_keys
        .into_iter()
        .map(|key| {
            let before = a.endpoints.get(key).map(|m| m.avg_latency).unwrap_or(0.0);
            let after = b.endpoints.get(key).map(|m| m.avg_latency).unwrap_or(0.0);
            metric_delta(key, before, after)
        })
        .collect();

    let mut component_keys: Vec<&String> = a.components.keys().collect();
    for key in b.components.keys() {
        if !component_keys.contains(&key) {
            component_keys.push(key);
        }
    }
    let component_deltas = component_keys
        .into_iter()
        .map(|key| {
            let before = a.components.get(key).map(|m| m.avg_duration);
            let after = b.components.get(key).map(|m| m.avg_duration);
            let (before_value, after_value) = match (before, after) {
                (Some(x), Some(y)) => (x, mean(&[x, y])),
                (Some(x), None) => (x, 0.0),
                (None, Some(y)) => (0.0, y),
                (None, None) => (0.0, 0.0),
            };
            metric_delta(key, before_value, after_value)
        })
        .collect();

    let mut store_keys: Vec<&String> = a.stores.keys().collect();
    for key in b.stores.keys() {
        if !store_keys.contains(&key) {
            store_keys.push(key);
        }
    }
    let store_deltas = store_keys
        .into_iter()
        .map(|key| {
            let before = a.stores.get(key).map(|m| m.update_count as f64).unwrap_or(0.0);
            let after = b.stores.get(key).map(|m| m.update_count as f64).unwrap_or(0.0);
            metric_delta(key, before, after)
        })
        .collect();

    let mut vital_keys: Vec<&String> = a.web_vitals.keys().collect();
    for key in b.web_vitals.keys() {
        if !vital_keys.contains(&key) {
            vital_keys.push(key);
        }
    }
    let vital_deltas = vital_keys
        .into_iter()
        .map(|key| {
            let before = a.web_vitals.get(key).map(|m| m.value).unwrap_or(0.0);
            let after = b.web_vitals.get(key).map(|m| m.value).unwrap_or(0.0);
            metric_delta(key, before, after)
        })
        .collect();

    let mut query_keys: Vec<&String> = a.queries.keys().collect();
    for key in b.queries.keys() {
        if !query_keys.contains(&key) {
            query_keys.push(key);
        }
    }
    let query_deltas = query_keys
        .into_iter()
        .map(|key| {
            let before = a.queries.get(key).map(|m| m.avg_duration).unwrap_or(0.0);
            let after = b.queries.get(key).map(|m| m.avg_duration).unwrap_or(0.0);
            metric_delta(key, before, after)
        })
        .collect();

    SessionComparison {
        endpoint_deltas,
        component_deltas,
        store_deltas,
        vital_deltas,
        query_deltas,
        error_count_delta: b.error_count as i64 - a.error_count as i64,
        total_events_delta: b.total_events as i64 - a.total_events as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_types::{ConsoleEventFields, ConsoleLevel, EventHeader};

    fn console_error(ts: i64, session_id: &str) -> RuntimeEvent {
        RuntimeEvent::Console(ConsoleEventFields {
            header: EventHeader {
                event_id: format!("e{ts}"),
                session_id: session_id.to_string(),
                timestamp: ts,
            },
            level: ConsoleLevel::Error,
            message: "boom".to_string(),
            args: Vec::new(),
            stack_trace: None,
            source_file: None,
        })
    }

    #[test]
    fn compute_metrics_counts_console_errors() {
        let events = vec![console_error(1, "s1"), console_error(2, "s1"), console_error(3, "other")];
        let metrics = compute_metrics("s1", "proj", &events);
        assert_eq!(metrics.total_events, 2);
        assert_eq!(metrics.error_count, 2);
    }

    #[test]
    fn compare_sessions_classifies_regression_and_improvement() {
        let regression = metric_delta("a", 100.0, 150.0);
        assert_eq!(regression.classification, DeltaClassification::Regression);
        let improvement = metric_delta("b", 100.0, 50.0);
        assert_eq!(improvement.classification, DeltaClassification::Improvement);
        let unchanged = metric_delta("c", 100.0, 105.0);
        assert_eq!(unchanged.classification, DeltaClassification::Unchanged);
    }

    #[test]
    fn compare_sessions_new_metric_key_compares_against_zero_baseline() {
        let a = SessionMetrics::default();
        let mut b = SessionMetrics::default();
        b.stores.insert(
            "cart".to_string(),
            StoreMetrics { update_count: 5 },
        );
        let comparison = compare_sessions(&a, &b);
        assert_eq!(comparison.store_deltas.len(), 1);
        assert_eq!(comparison.store_deltas[0].before, 0.0);
        assert_eq!(comparison.store_deltas[0].after, 5.0);
    }
}
