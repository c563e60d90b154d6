//! Issue Detector: pure functions over buffered events, each
//! producing zero or more issues, composed into one severity-sorted list.

use std::collections::HashSet;

use runtimescope_types::{ConsoleLevel, DetectedIssue, RenderCause, RuntimeEvent, Severity};

use crate::stats::{group_by_ordered, sliding_window_any_trigger};

const N1_WINDOW_MS: i64 = 2000;
const N1_THRESHOLD: usize = 5;

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

fn network_refs(events: &[RuntimeEvent]) -> Vec<&RuntimeEvent> {
    events.iter().filter(|e| matches!(e, RuntimeEvent::Network(_))).collect()
}

fn failed_requests(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let failed: Vec<&RuntimeEvent> = network_refs(events)
        .into_iter()
        .filter(|e| matches!(e, RuntimeEvent::Network(f) if f.status.map(|s| s >= 400).unwrap_or(false)))
        .collect();

    group_by_ordered(&failed, |e| match e {
        RuntimeEvent::Network(f) => format!("{} {} {}", f.status.unwrap_or(0), f.method, f.url),
        _ => unreachable!(),
    })
    .into_iter()
    .map(|(key, group)| {
        let status = match group[0] {
            RuntimeEvent::Network(f) => f.status.unwrap_or(0),
            _ => unreachable!(),
        };
        let severity = if status >= 500 { Severity::High } else { Severity::Medium };
        let evidence: Vec<&RuntimeEvent> = group.iter().take(3).copied().collect();
        make_issue(
            "failed_requests",
            &key,
            severity,
            format!("Repeated failing requests: {key}"),
            format!("{} request(s) returned {status}", group.len()),
            &evidence,
            None,
        )
    })
    .collect()
}

fn slow_requests(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let mut slow: Vec<&RuntimeEvent> = network_refs(events)
        .into_iter()
        .filter(|e| matches!(e, RuntimeEvent::Network(f) if f.duration.unwrap_or(0.0) > 3000.0))
        .collect();

    if slow.is_empty() {
        return Vec::new();
    }

    slow.sort_by(|a, b| {
        let da = match a {
            RuntimeEvent::Network(f) => f.duration.unwrap_or(0.0),
            _ => unreachable!(),
        };
        let db = match b {
            RuntimeEvent::Network(f) => f.duration.unwrap_or(0.0),
            _ => unreachable!(),
        };
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });
    let evidence: Vec<&RuntimeEvent> = slow.iter().take(5).copied().collect();

    vec![make_issue(
        "slow_requests",
        "all",
        Severity::Medium,
        "Slow network requests",
        format!("{} request(s) exceeded 3000ms", slow.len()),
        &evidence,
        Some("Investigate server-side latency or add client-side caching".to_string()),
    )]
}

fn n1_requests(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let refs = network_refs(events);
    group_by_ordered(&refs, |e| match e {
        RuntimeEvent::Network(f) => format!("{} {}", f.method, f.url),
        _ => unreachable!(),
    })
    .into_iter()
    .filter(|(_, group)| group.len() > N1_THRESHOLD)
    .filter_map(|(key, mut group)| {
        group.sort_by_key(|e| e.timestamp());
        let timestamps: Vec<i64> = group.iter().map(|e| e.timestamp()).collect();
        if sliding_window_any_trigger(&timestamps, N1_WINDOW_MS, N1_THRESHOLD) {
            let evidence: Vec<&RuntimeEvent> = group.iter().take(5).copied().collect();
            Some(make_issue(
                "n1_requests",
                &key,
                Severity::Medium,
                format!("Possible N+1 requests: {key}"),
                format!("{} calls to {key} within a short window", group.len()),
                &evidence,
                Some("Batch these requests or cache the response".to_string()),
            ))
        } else {
            None
        }
    })
    .collect()
}

fn console_error_spam(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let errors: Vec<&RuntimeEvent> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Console(f) if f.level == ConsoleLevel::Error))
        .collect();

    group_by_ordered(&errors, |e| match e {
        RuntimeEvent::Console(f) => f.message.chars().take(200).collect::<String>(),
        _ => unreachable!(),
    })
    .into_iter()
    .filter_map(|(key, group)| {
        if group.len() <= N1_THRESHOLD {
            return None;
        }
        let timestamps: Vec<i64> = group.iter().map(|e| e.timestamp()).collect();
        let span = timestamps.iter().max().copied().unwrap_or(0) - timestamps.iter().min().copied().unwrap_or(0);
        if span > 10_000 {
            return None;
        }
        let evidence: Vec<&RuntimeEvent> = group.iter().take(3).copied().collect();
        Some(make_issue(
            "console_error_spam",
            &key,
            Severity::Medium,
            "Repeated console errors",
            format!("\"{key}\" logged {} times within {span}ms", group.len()),
            &evidence,
            None,
        ))
    })
    .collect()
}

fn high_error_rate(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let console: Vec<&RuntimeEvent> = events.iter().filter(|e| matches!(e, RuntimeEvent::Console(_))).collect();
    if console.len() < 10 {
        return Vec::new();
    }
    let error_count = console
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Console(f) if f.level == ConsoleLevel::Error))
        .count();
    let rate = error_count as f64 / console.len() as f64;
    if rate <= 0.30 {
        return Vec::new();
    }
    let evidence: Vec<&RuntimeEvent> = console
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Console(f) if f.level == ConsoleLevel::Error))
        .take(5)
        .copied()
        .collect();
    vec![make_issue(
        "high_error_rate",
        "all",
        Severity::High,
        "High console error rate",
        format!(
            "{error_count}/{} console messages ({:.0}%) are errors",
            console.len(),
            rate * 100.0
        ),
        &evidence,
        None,
    )]
}

fn excessive_rerenders(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for event in events {
        let profiles = match event {
            RuntimeEvent::Render(f) => &f.profiles,
            _ => continue,
        };
        for profile in profiles.iter().filter(|p| p.suspicious) {
            if !seen.insert(profile.component_name.clone()) {
                continue;
            }
            let suggestion = match profile.last_render_cause {
                RenderCause::Props => "Memoize the component or its props to avoid redundant renders",
                RenderCause::State => "Split state so unrelated updates don't re-render this component",
                RenderCause::Context => "Narrow the consumed context or split the provider",
                RenderCause::Parent => "Memoize the child so parent re-renders don't cascade",
                RenderCause::Unknown => "Profile the component to identify the render trigger",
            };
            issues.push(make_issue(
                "excessive_rerenders",
                &profile.component_name,
                Severity::Medium,
                format!("Excessive re-renders: {}", profile.component_name),
                format!(
                    "{} rendered {} times ({:.1}/s)",
                    profile.component_name, profile.render_count, profile.render_velocity
                ),
                &[event],
                Some(suggestion.to_string()),
            ));
        }
    }
    issues
}

fn large_state_update(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    use runtimescope_types::StatePhase;
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for event in events {
        let fields = match event {
            RuntimeEvent::State(f) if f.phase == StatePhase::Update => f,
            _ => continue,
        };
        let size = serde_json::to_vec(&fields.state).map(|v| v.len()).unwrap_or(0);
        if size <= 100 * 1024 {
            continue;
        }
        if !seen.insert(fields.store_id.clone()) {
            continue;
        }
        issues.push(make_issue(
            "large_state_update",
            &fields.store_id,
            Severity::Medium,
            format!("Large state update: {}", fields.store_id),
            format!("State update for {} was {} bytes", fields.store_id, size),
            &[event],
            Some("Store a normalized/smaller slice instead of the full object".to_string()),
        ));
    }
    issues
}

fn poor_web_vital(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    use runtimescope_types::VitalRating;
    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for event in events {
        let fields = match event {
            RuntimeEvent::Performance(f) if f.rating == Some(VitalRating::Poor) => f,
            _ => continue,
        };
        if !seen.insert(fields.metric_name.clone()) {
            continue;
        }
        let severity = if matches!(fields.metric_name.as_str(), "LCP" | "CLS") {
            Severity::High
        } else {
            Severity::Medium
        };
        issues.push(make_issue(
            "poor_web_vital",
            &fields.metric_name,
            severity,
            format!("Poor {} web vital", fields.metric_name),
            format!("{} = {} (rated poor)", fields.metric_name, fields.value),
            &[event],
            None,
        ));
    }
    issues
}

fn slow_db_queries(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let mut slow: Vec<&RuntimeEvent> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Database(f) if f.duration > 500.0))
        .collect();

    if slow.is_empty() {
        return Vec::new();
    }

    slow.sort_by(|a, b| {
        let da = match a {
            RuntimeEvent::Database(f) => f.duration,
            _ => unreachable!(),
        };
        let db = match b {
            RuntimeEvent::Database(f) => f.duration,
            _ => unreachable!(),
        };
        db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
    });
    let evidence: Vec<&RuntimeEvent> = slow.iter().take(5).copied().collect();

    vec![make_issue(
        "slow_db_queries",
        "all",
        Severity::Medium,
        "Slow database queries",
        format!("{} quer(ies) exceeded 500ms", slow.len()),
        &evidence,
        Some("Add an index or reduce the result set".to_string()),
    )]
}

fn n1_db_queries(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    use runtimescope_types::DbOperation;
    let selects: Vec<&RuntimeEvent> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Database(f) if f.operation == DbOperation::Select))
        .collect();

    group_by_ordered(&selects, |e| match e {
        RuntimeEvent::Database(f) => f.tables_accessed.first().cloned().unwrap_or_default(),
        _ => unreachable!(),
    })
    .into_iter()
    .filter(|(key, group)| !key.is_empty() && group.len() > N1_THRESHOLD)
    .filter_map(|(key, mut group)| {
        group.sort_by_key(|e| e.timestamp());
        let timestamps: Vec<i64> = group.iter().map(|e| e.timestamp()).collect();
        if sliding_window_any_trigger(&timestamps, N1_WINDOW_MS, N1_THRESHOLD) {
            let evidence: Vec<&RuntimeEvent> = group.iter().take(5).copied().collect();
            Some(make_issue(
                "n1_db_queries",
                &key,
                Severity::High,
                format!("Possible N+1 queries on {key}"),
                format!("{} SELECTs against {key} within a short window", group.len()),
                &evidence,
                Some("Use a join or batched fetch instead of per-row queries".to_string()),
            ))
        } else {
            None
        }
    })
    .collect()
}

/// `detectIssues(events)`: concatenates every detector's output (in
/// registration order) then stably sorts by severity (`high < medium <
/// low`), preserving registration order within a severity.
pub fn detect_issues(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let mut issues = Vec::new();
    issues.extend(failed_requests(events));
    issues.extend(slow_requests(events));
    issues.extend(n1_requests(events));
    issues.extend(console_error_spam(events));
    issues.extend(high_error_rate(events));
    issues.extend(excessive_rerenders(events));
    issues.extend(large_state_update(events));
    issues.extend(poor_web_vital(events));
    issues.extend(slow_db_queries(events));
    issues.extend(n1_db_queries(events));
    issues.sort_by_key(|issue| issue.severity);
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_types::EventHeader;

    fn network(event_id: &str, ts: i64, url: &str, status: Option<u16>, duration: Option<f64>) -> RuntimeEvent {
        RuntimeEvent::Network(runtimescope_types::NetworkEventFields {
            header: EventHeader {
                event_id: event_id.into(),
                session_id: "s1".into(),
                timestamp: ts,
            },
            url: url.into(),
            method: "GET".into(),
            status,
            request_headers: Default::default(),
            response_headers: Default::default(),
            request_body_size: None,
            response_body_size: None,
            duration,
            ttfb: None,
            request_body: None,
            response_body: None,
            error_phase: None,
            error_message: None,
            source: None,
            graphql_operation: None,
        })
    }

    fn console_error(event_id: &str, ts: i64, message: &str) -> RuntimeEvent {
        RuntimeEvent::Console(runtimescope_types::ConsoleEventFields {
            header: EventHeader {
                event_id: event_id.into(),
                session_id: "s1".into(),
                timestamp: ts,
            },
            level: ConsoleLevel::Error,
            message: message.into(),
            args: Vec::new(),
            stack_trace: None,
            source_file: None,
        })
    }

    #[test]
    fn scenario_n1_network() {
        let events: Vec<RuntimeEvent> = (0..8)
            .map(|i| network(&format!("e{i}"), i * 100, "https://api.com/x", Some(200), None))
            .collect();
        let issues = detect_issues(&events);
        assert_eq!(issues.iter().filter(|i| i.pattern == "n1_requests").count(), 1);

        let few: Vec<RuntimeEvent> = (0..4)
            .map(|i| network(&format!("e{i}"), i * 100, "https://api.com/x", Some(200), None))
            .collect();
        let issues = detect_issues(&few);
        assert_eq!(issues.iter().filter(|i| i.pattern == "n1_requests").count(), 0);
    }

    #[test]
    fn scenario_slow_and_failed_ordering() {
        let events = vec![
            network("e1", 0, "https://api.com/a", Some(500), None),
            network("e2", 1, "https://api.com/b", Some(200), Some(4000.0)),
        ];
        let issues = detect_issues(&events);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].pattern, "failed_requests");
        assert_eq!(issues[0].severity, Severity::High);
        assert_eq!(issues[1].pattern, "slow_requests");
        assert_eq!(issues[1].severity, Severity::Medium);
    }

    #[test]
    fn scenario_console_spam() {
        let events: Vec<RuntimeEvent> = (0..8).map(|i| console_error(&format!("e{i}"), i * 500, "Conn failed")).collect();
        let issues = detect_issues(&events);
        assert_eq!(issues.iter().filter(|i| i.pattern == "console_error_spam").count(), 1);
    }

    #[test]
    fn issues_are_sorted_by_severity() {
        let events = vec![
            network("e1", 0, "https://api.com/a", Some(500), None),
            network("e2", 1, "https://api.com/b", Some(200), Some(4000.0)),
        ];
        let issues = detect_issues(&events);
        for pair in issues.windows(2) {
            assert!(pair[0].severity <= pair[1].severity);
        }
    }
}
