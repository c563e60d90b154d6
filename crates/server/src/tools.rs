// crates/server/src/tools.rs
//! Thin tool adapter: one function per tool name, each
//! parsing typed params, calling exactly one `EventStore`/engine function,
//! and wrapping the result in the uniform `{summary, data, issues,
//! metadata}` envelope: thin `async fn`-shaped handlers, no business logic
//! beyond calling into `runtimescope-core` and shaping the response JSON.

use std::sync::Arc;

use runtimescope_core::{issues, query_monitor, session, EventFilter};
use runtimescope_types::{ToolResponse, ToolResponseMetadata};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ServerState;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn metadata(event_count: u64, session_id: Option<String>, since_seconds: Option<i64>, now: i64) -> ToolResponseMetadata {
    ToolResponseMetadata {
        time_range: runtimescope_types::TimeRange {
            from: since_seconds.map(|s| now - s * 1000).unwrap_or(0),
            to: now,
        },
        event_count,
        session_id,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolParams {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub since_seconds: Option<i64>,
    #[serde(default)]
    pub url_pattern: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub min_duration_ms: Option<f64>,
    #[serde(default)]
    pub session_a: Option<String>,
    #[serde(default)]
    pub session_b: Option<String>,
}

fn project_store(state: &ServerState, params: &ToolParams) -> ApiResult<Arc<runtimescope_core::EventStore>> {
    let project = params.project.clone().ok_or_else(|| ApiError::InvalidParams("missing `project`".to_string()))?;
    state.registry.get(&project).ok_or(ApiError::UnknownProject(project))
}

fn filter(params: &ToolParams) -> EventFilter {
    EventFilter {
        since_seconds: params.since_seconds,
        url_pattern: params.url_pattern.clone(),
        status: params.status,
        method: params.method.clone(),
        min_duration_ms: params.min_duration_ms,
        ..Default::default()
    }
}

/// `get_network_requests`
pub fn get_network_requests(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_network_requests(&filter(params), now);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} network request(s)", events.len()), json!(events), metadata))
}

/// `get_console_messages`
pub fn get_console_messages(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_console_messages(&filter(params), now);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} console message(s)", events.len()), json!(events), metadata))
}

/// `detect_issues`
pub fn detect_issues(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_all_events();
    let event_count = events.len() as u64;
    let found = issues::detect_issues(&events);
    let metadata = metadata(event_count, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} issue(s) detected", found.len()), json!(found), metadata))
}

/// `get_api_catalog`
pub fn get_api_catalog(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_all_events();
    let catalog = runtimescope_core::discovery::get_catalog(&events);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} endpoint(s) catalogued", catalog.len()), json!(catalog), metadata))
}

/// `get_api_health`
pub fn get_api_health(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_all_events();
    let health = runtimescope_core::discovery::get_health(&events);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("health for {} endpoint(s)", health.len()), json!(health), metadata))
}

/// `get_query_stats`
pub fn get_query_stats(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_database_events(&EventFilter::default(), now).into_iter().map(runtimescope_types::RuntimeEvent::Database).collect::<Vec<_>>();
    let stats = query_monitor::aggregate_query_stats(&events);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} distinct quer(y/ies)", stats.len()), json!(stats), metadata))
}

/// `suggest_indexes`
pub fn suggest_indexes(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_database_events(&EventFilter::default(), now).into_iter().map(runtimescope_types::RuntimeEvent::Database).collect::<Vec<_>>();
    let suggestions = query_monitor::suggest_indexes(&events);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} index suggestion(s)", suggestions.len()), json!(suggestions), metadata))
}

/// `get_session_metrics`
pub fn get_session_metrics(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let session_id = params.session_id.clone().ok_or_else(|| ApiError::InvalidParams("missing `sessionId`".to_string()))?;
    let project = params.project.clone().expect("validated by project_store");
    let now = now_ms();
    let events: Vec<_> = store.get_all_events().into_iter().filter(|e| e.session_id() == session_id).collect();
    let event_count = events.len() as u64;
    let metrics = session::compute_metrics(&session_id, &project, &events);
    let metadata = metadata(event_count, Some(session_id), params.since_seconds, now);
    Ok(ToolResponse::new("computed session metrics", json!(metrics), metadata))
}

/// `compare_sessions`
pub fn compare_sessions(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let project = params.project.clone().expect("validated by project_store");
    let (events_a, events_b, session_a, session_b) = session_pair(&store, params)?;

    let metrics_a = session::compute_metrics(&session_a, &project, &events_a);
    let metrics_b = session::compute_metrics(&session_b, &project, &events_b);
    let comparison = session::compare_sessions(&metrics_a, &metrics_b);

    let now = now_ms();
    let metadata = metadata((events_a.len() + events_b.len()) as u64, None, params.since_seconds, now);
    Ok(ToolResponse::new(format!("compared {session_a} -> {session_b}"), json!(comparison), metadata))
}

/// `get_api_changes`
pub fn get_api_changes(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let (events_a, events_b, session_a, session_b) = session_pair(&store, params)?;

    let changes = runtimescope_core::discovery::get_api_changes(&events_a, &events_b);
    let now = now_ms();
    let metadata = metadata((events_a.len() + events_b.len()) as u64, None, params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} api change(s) between {session_a} and {session_b}", changes.len()), json!(changes), metadata))
}

/// `detect_n1_queries`
pub fn detect_n1_queries(state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let store = project_store(state, params)?;
    let now = now_ms();
    let events = store.get_database_events(&EventFilter::default(), now).into_iter().map(runtimescope_types::RuntimeEvent::Database).collect::<Vec<_>>();
    let found = query_monitor::detect_n1_queries(&events);
    let metadata = metadata(events.len() as u64, params.session_id.clone(), params.since_seconds, now);
    Ok(ToolResponse::new(format!("{} n+1 quer{} issue(s) detected", found.len(), if found.len() == 1 { "y" } else { "ies" }), json!(found), metadata))
}

fn session_pair(store: &Arc<runtimescope_core::EventStore>, params: &ToolParams) -> ApiResult<(Vec<runtimescope_types::RuntimeEvent>, Vec<runtimescope_types::RuntimeEvent>, String, String)> {
    let session_a = params.session_a.clone().ok_or_else(|| ApiError::InvalidParams("missing `sessionA`".to_string()))?;
    let session_b = params.session_b.clone().ok_or_else(|| ApiError::InvalidParams("missing `sessionB`".to_string()))?;

    let all_events = store.get_all_events();
    let events_a: Vec<_> = all_events.iter().filter(|e| e.session_id() == session_a).cloned().collect();
    let events_b: Vec<_> = all_events.iter().filter(|e| e.session_id() == session_b).cloned().collect();

    Ok((events_a, events_b, session_a, session_b))
}

pub type ToolFn = fn(&ServerState, &ToolParams) -> ApiResult<ToolResponse>;

/// Dispatch table: tool name -> handler. Unrecognized names are a caller
/// error, not an engine error ("no data" is reserved for *empty*
/// results, not unknown tools).
pub fn dispatch(name: &str, state: &ServerState, params: &ToolParams) -> ApiResult<ToolResponse> {
    let handler: ToolFn = match name {
        "get_network_requests" => get_network_requests,
        "get_console_messages" => get_console_messages,
        "detect_issues" => detect_issues,
        "get_api_catalog" => get_api_catalog,
        "get_api_health" => get_api_health,
        "get_api_changes" => get_api_changes,
        "get_query_stats" => get_query_stats,
        "detect_n1_queries" => detect_n1_queries,
        "suggest_indexes" => suggest_indexes,
        "get_session_metrics" => get_session_metrics,
        "compare_sessions" => compare_sessions,
        other => return Err(ApiError::UnknownTool(other.to_string())),
    };
    handler(state, params)
}

pub fn parse_params(value: Value) -> ApiResult<ToolParams> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::registry::ProjectRegistry;
    use runtimescope_db::Database;
    use runtimescope_types::{BuildMeta, EventHeader, NetworkEventFields, SessionEventFields};

    fn session_event(session_id: &str, ts: i64) -> runtimescope_types::RuntimeEvent {
        runtimescope_types::RuntimeEvent::Session(SessionEventFields {
            header: EventHeader {
                event_id: format!("session-{ts}"),
                session_id: session_id.into(),
                timestamp: ts,
            },
            app_name: "demo-app".into(),
            connected_at: ts,
            sdk_version: "1.0.0".into(),
            build_meta: None::<BuildMeta>,
        })
    }

    fn network_event(session_id: &str, ts: i64, url: &str, status: u16) -> runtimescope_types::RuntimeEvent {
        runtimescope_types::RuntimeEvent::Network(NetworkEventFields {
            header: EventHeader {
                event_id: format!("net-{ts}"),
                session_id: session_id.into(),
                timestamp: ts,
            },
            url: url.into(),
            method: "GET".into(),
            status: Some(status),
            request_headers: Default::default(),
            response_headers: Default::default(),
            request_body_size: None,
            response_body_size: None,
            duration: Some(42.0),
            ttfb: None,
            request_body: None,
            response_body: None,
            error_phase: None,
            error_message: None,
            source: None,
            graphql_operation: None,
        })
    }

    async fn state_with_project(project: &str) -> ServerState {
        let db = Database::new_in_memory().await.unwrap();
        let registry = ProjectRegistry::new(Arc::new(db), 100);
        registry.get_or_create(project);
        ServerState::new(TransportConfig::default(), registry)
    }

    fn params(project: &str) -> ToolParams {
        ToolParams {
            project: Some(project.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_project_is_invalid_params() {
        let state = state_with_project("demo").await;
        let err = get_network_requests(&state, &ToolParams::default()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn unknown_project_is_404() {
        let state = state_with_project("demo").await;
        let err = get_network_requests(&state, &params("other")).unwrap_err();
        assert!(matches!(err, ApiError::UnknownProject(p) if p == "other"));
    }

    #[tokio::test]
    async fn get_network_requests_returns_events_for_project() {
        let state = state_with_project("demo").await;
        let store = state.registry.get("demo").unwrap();
        store.add_event(session_event("s1", 1000));
        store.add_event(network_event("s1", 1001, "https://api.com/x", 200));

        let response = get_network_requests(&state, &params("demo")).unwrap();
        assert_eq!(response.metadata.event_count, 1);
        assert!(response.summary.contains("1 network request"));
    }

    #[tokio::test]
    async fn detect_issues_on_empty_project_has_no_issues() {
        let state = state_with_project("demo").await;
        let response = detect_issues(&state, &params("demo")).unwrap();
        assert_eq!(response.data.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn compare_sessions_requires_both_session_ids() {
        let state = state_with_project("demo").await;
        let mut p = params("demo");
        p.session_a = Some("s1".to_string());
        let err = compare_sessions(&state, &p).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn get_api_changes_between_two_sessions() {
        let state = state_with_project("demo").await;
        let store = state.registry.get("demo").unwrap();
        store.add_event(session_event("a", 1000));
        store.add_event(network_event("a", 1001, "https://api.com/x", 200));
        store.add_event(session_event("b", 2000));
        store.add_event(network_event("b", 2001, "https://api.com/y", 200));

        let mut p = params("demo");
        p.session_a = Some("a".to_string());
        p.session_b = Some("b".to_string());
        let response = get_api_changes(&state, &p).unwrap();
        assert!(response.data.is_array());
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_tool_name() {
        let state = state_with_project("demo").await;
        let err = dispatch("not_a_tool", &state, &params("demo")).unwrap_err();
        assert!(matches!(err, ApiError::UnknownTool(name) if name == "not_a_tool"));
    }
}
