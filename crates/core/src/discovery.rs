//! API Discovery Engine: URL normalization, service detection, auth
//! inference, catalog/contract/health/service-map/change-detection.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use runtimescope_types::{
    ApiChange, ApiEndpoint, AuthInfo, AuthType, Contract, ContractField, DetectedIssue, EndpointChangeKind,
    FieldChange, FieldChangeKind, GraphqlOperationSummary, NetworkEventFields, RuntimeEvent, ServiceMap, Severity,
};
use serde_json::Value;

use crate::error::DiscoveryError;
use crate::stats::{mean, percentile};

const CONTRACT_SAMPLE_SIZE: usize = 10;
const REFINEMENT_GROUP_THRESHOLD: usize = 5;
const REFINEMENT_CARDINALITY_THRESHOLD: usize = 5;

struct ParsedUrl {
    host: String,
    path: String,
}

/// A minimal, dependency-free URL split: `scheme://[user@]host[:port]/path`.
/// Anything that doesn't contain `://` is treated as unparseable.
fn parse_url(url: &str) -> Result<ParsedUrl, DiscoveryError> {
    let after_scheme = url
        .find("://")
        .map(|i| &url[i + 3..])
        .ok_or_else(|| DiscoveryError::url_parse(url, "missing scheme"))?;
    let (authority, path) = match after_scheme.find('/') {
        Some(i) => (&after_scheme[..i], &after_scheme[i..]),
        None => (after_scheme, ""),
    };
    if authority.is_empty() {
        return Err(DiscoveryError::url_parse(url, "missing host"));
    }
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    let host = authority.split(':').next().unwrap_or(authority).to_string();
    Ok(ParsedUrl {
        host,
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap())
}
fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").unwrap())
}
fn object_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[0-9a-f]{24}$").unwrap())
}
fn hex8_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[0-9a-f]{8,}$").unwrap())
}
fn id20_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{20,}$").unwrap())
}
fn token16_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/=_-]{16,}$").unwrap())
}

fn normalize_segment(segment: &str) -> String {
    if segment.is_empty() {
        return segment.to_string();
    }
    if uuid_re().is_match(segment)
        || digits_re().is_match(segment)
        || object_id_re().is_match(segment)
        || hex8_re().is_match(segment)
        || id20_re().is_match(segment)
    {
        return ":id".to_string();
    }
    if token16_re().is_match(segment) {
        return ":token".to_string();
    }
    segment.to_string()
}

/// Splits `pathname` on `/` and replaces each segment with the first
/// matching rule. Idempotent: `:id`/`:token` never re-match a rule.
pub fn normalize_path(pathname: &str) -> String {
    pathname.split('/').map(normalize_segment).collect::<Vec<_>>().join("/")
}

/// `(baseUrl, normalizedPath)` for a raw request URL. Falls back to
/// `baseUrl = "unknown"`, `normalizedPath = url` on parse failure.
pub fn normalize_url(url: &str) -> (String, String) {
    match parse_url(url) {
        Ok(parsed) => (parsed.host, normalize_path(&parsed.path)),
        Err(_) => ("unknown".to_string(), url.to_string()),
    }
}

const SERVICE_TABLE: &[(&str, &str)] = &[
    ("supabase.co", "Supabase"),
    ("workers.dev", "Cloudflare Workers"),
    ("vercel.app", "Vercel"),
    ("stripe.com", "Stripe"),
    ("railway.app", "Railway"),
    ("netlify.app", "Netlify"),
    ("fly.dev", "Fly.io"),
    ("onrender.com", "Render"),
    ("github.com", "GitHub"),
    ("openai.com", "OpenAI"),
    ("anthropic.com", "Anthropic"),
    ("clerk.", "Clerk"),
    ("auth0.com", "Auth0"),
    ("firebaseio.com", "Firebase"),
    ("amazonaws.com", "AWS"),
    ("googleapis.com", "Google APIs"),
];

/// Detects the logical service behind `host` using an ordered
/// substring->name table, falling back to the last two dotted parts.
pub fn detect_service(host: &str) -> String {
    let lower = host.to_lowercase();
    if lower == "localhost" || lower.starts_with("127.0.0.1") {
        return "Your API".to_string();
    }
    for (pattern, name) in SERVICE_TABLE {
        if lower.contains(pattern) {
            return name.to_string();
        }
    }
    let parts: Vec<&str> = lower.split('.').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2..].join(".")
    } else {
        lower
    }
}

/// Case-insensitive header lookup.
fn header(headers: &HashMap<String, String>, name: &str) -> Option<String> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
}

pub fn detect_auth(headers: &HashMap<String, String>) -> AuthInfo {
    if let Some(value) = header(headers, "authorization") {
        if value.starts_with("Bearer ") || value.starts_with("bearer ") {
            return AuthInfo {
                auth_type: AuthType::Bearer,
                header_name: None,
            };
        }
        if value.starts_with("Basic ") || value.starts_with("basic ") {
            return AuthInfo {
                auth_type: AuthType::Basic,
                header_name: None,
            };
        }
        return AuthInfo {
            auth_type: AuthType::ApiKey,
            header_name: Some("Authorization".to_string()),
        };
    }
    for (key, _) in headers {
        let lower = key.to_lowercase();
        if lower.contains("api-key") || lower.contains("apikey") || lower == "x-api-key" {
            return AuthInfo {
                auth_type: AuthType::ApiKey,
                header_name: Some(key.clone()),
            };
        }
    }
    if header(headers, "cookie").is_some() {
        return AuthInfo {
            auth_type: AuthType::Cookie,
            header_name: None,
        };
    }
    AuthInfo {
        auth_type: AuthType::None,
        header_name: None,
    }
}

#[derive(Clone)]
struct EndpointAccumulator {
    method: String,
    base_url: String,
    normalized_path: String,
    call_count: u64,
    first_seen: i64,
    last_seen: i64,
    auth: AuthInfo,
    graphql_operation: Option<GraphqlOperationSummary>,
    durations: Vec<f64>,
    error_count: u64,
    error_codes: HashMap<String, u64>,
    samples: Vec<NetworkEventFields>,
}

fn endpoint_key(method: &str, base_url: &str, normalized_path: &str) -> String {
    format!("{method} {base_url} {normalized_path}")
}

/// Walks every network event and accumulates per-endpoint data, keyed by
/// `"METHOD baseUrl normalizedPath"`, in first-seen order.
fn accumulate(events: &[RuntimeEvent]) -> Vec<(String, EndpointAccumulator)> {
    let network: Vec<&NetworkEventFields> = events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::Network(f) => Some(f),
            _ => None,
        })
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, EndpointAccumulator> = HashMap::new();

    for f in network {
        let (base_url, normalized_path) = normalize_url(&f.url);
        let method = f.method.to_uppercase();
        let key = endpoint_key(&method, &base_url, &normalized_path);
        let auth = detect_auth(&f.request_headers);
        let graphql_operation = f.graphql_operation.as_ref().map(|g| GraphqlOperationSummary {
            op_type: match g.op_type {
                runtimescope_types::GraphqlOperationType::Query => "query".to_string(),
                runtimescope_types::GraphqlOperationType::Mutation => "mutation".to_string(),
                runtimescope_types::GraphqlOperationType::Subscription => "subscription".to_string(),
            },
            name: g.name.clone(),
        });

        let entry = map.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            EndpointAccumulator {
                method: method.clone(),
                base_url: base_url.clone(),
                normalized_path: normalized_path.clone(),
                call_count: 0,
                first_seen: f.header.timestamp,
                last_seen: f.header.timestamp,
                auth: auth.clone(),
                graphql_operation: graphql_operation.clone(),
                durations: Vec::new(),
                error_count: 0,
                error_codes: HashMap::new(),
                samples: Vec::new(),
            }
        });

        entry.call_count += 1;
        entry.first_seen = entry.first_seen.min(f.header.timestamp);
        entry.last_seen = entry.last_seen.max(f.header.timestamp);
        if let Some(d) = f.duration {
            entry.durations.push(d);
        }
        if let Some(status) = f.status {
            if status >= 400 {
                entry.error_count += 1;
                *entry.error_codes.entry(status.to_string()).or_insert(0) += 1;
            }
        }
        if entry.samples.len() < CONTRACT_SAMPLE_SIZE && f.response_body.is_some() {
            entry.samples.push(f.clone());
        }
    }

    order.into_iter().map(|key| { let acc = map.remove(&key).unwrap(); (key, acc) }).collect()
}

/// Groups endpoints by `(method, baseUrl, segmentCount)`; in groups with
/// more than [`REFINEMENT_GROUP_THRESHOLD`] members, rewrites any segment
/// position whose distinct-value count exceeds
/// [`REFINEMENT_CARDINALITY_THRESHOLD`] to `:id`, then merges duplicates.
fn refine(mut accumulators: Vec<(String, EndpointAccumulator)>) -> Vec<(String, EndpointAccumulator)> {
    let group_key = |acc: &EndpointAccumulator| {
        (acc.method.clone(), acc.base_url.clone(), acc.normalized_path.split('/').count())
    };

    let mut groups: HashMap<(String, String, usize), Vec<usize>> = HashMap::new();
    for (idx, (_, acc)) in accumulators.iter().enumerate() {
        groups.entry(group_key(acc)).or_default().push(idx);
    }

    for indices in groups.values() {
        if indices.len() <= REFINEMENT_GROUP_THRESHOLD {
            continue;
        }
        let segment_count = accumulators[indices[0]].1.normalized_path.split('/').count();
        let mut rewrite_positions = HashSet::new();
        for pos in 0..segment_count {
            let distinct: HashSet<&str> = indices
                .iter()
                .map(|&i| accumulators[i].1.normalized_path.split('/').nth(pos).unwrap_or(""))
                .collect();
            if distinct.len() > REFINEMENT_CARDINALITY_THRESHOLD {
                rewrite_positions.insert(pos);
            }
        }
        if rewrite_positions.is_empty() {
            continue;
        }
        for &i in indices {
            let mut segments: Vec<String> =
                accumulators[i].1.normalized_path.split('/').map(str::to_string).collect();
            for &pos in &rewrite_positions {
                if let Some(segment) = segments.get_mut(pos) {
                    *segment = ":id".to_string();
                }
            }
            accumulators[i].1.normalized_path = segments.join("/");
        }
    }

    // Merge duplicates created by refinement, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, EndpointAccumulator> = HashMap::new();
    for (_, acc) in accumulators {
        let key = endpoint_key(&acc.method, &acc.base_url, &acc.normalized_path);
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.call_count += acc.call_count;
                existing.first_seen = existing.first_seen.min(acc.first_seen);
                existing.last_seen = existing.last_seen.max(acc.last_seen);
                existing.durations.extend(acc.durations);
                existing.error_count += acc.error_count;
                for (code, count) in acc.error_codes {
                    *existing.error_codes.entry(code).or_insert(0) += count;
                }
                for sample in acc.samples {
                    if existing.samples.len() < CONTRACT_SAMPLE_SIZE {
                        existing.samples.push(sample);
                    }
                }
            }
            None => {
                order.push(key.clone());
                merged.insert(key, acc);
            }
        }
    }
    order.into_iter().map(|key| { let acc = merged.remove(&key).unwrap(); (key, acc) }).collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct FieldAcc {
    types: Vec<String>,
    nullable: bool,
    example: Value,
}

fn record_field(order: &mut Vec<String>, fields: &mut HashMap<String, FieldAcc>, path: &str, value: &Value) {
    let type_name = json_type_name(value).to_string();
    let entry = fields.entry(path.to_string()).or_insert_with(|| {
        order.push(path.to_string());
        FieldAcc {
            types: Vec::new(),
            nullable: false,
            example: Value::Null,
        }
    });
    if matches!(value, Value::Null) {
        entry.nullable = true;
    }
    if !entry.types.contains(&type_name) {
        entry.types.push(type_name);
    }
    if entry.example.is_null() && !value.is_null() {
        entry.example = match value {
            Value::Array(arr) => Value::String(format!("[{} items]", arr.len())),
            other => other.clone(),
        };
    }
}

fn walk_json(order: &mut Vec<String>, fields: &mut HashMap<String, FieldAcc>, value: &Value, prefix: &str) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
                record_field(order, fields, &path, val);
                match val {
                    Value::Object(_) => walk_json(order, fields, val, &path),
                    Value::Array(arr) => {
                        if let Some(first) = arr.first() {
                            if first.is_object() {
                                walk_json(order, fields, first, &path);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::Array(arr) => {
            record_field(order, fields, prefix, value);
            if let Some(first) = arr.first() {
                if first.is_object() {
                    walk_json(order, fields, first, prefix);
                }
            }
        }
        _ => {}
    }
}

/// Infers a response-body shape over up to [`CONTRACT_SAMPLE_SIZE`] sampled
/// events with a response body.
fn infer_contract(samples: &[NetworkEventFields]) -> Option<Contract> {
    if samples.is_empty() {
        return None;
    }
    let mut order = Vec::new();
    let mut fields: HashMap<String, FieldAcc> = HashMap::new();
    for sample in samples.iter().take(CONTRACT_SAMPLE_SIZE) {
        if let Some(body) = &sample.response_body {
            walk_json(&mut order, &mut fields, body, "");
        }
    }
    if fields.is_empty() {
        return None;
    }
    let contract_fields = order
        .into_iter()
        .map(|path| {
            let acc = fields.remove(&path).unwrap();
            ContractField {
                path,
                field_type: acc.types.join(" | "),
                nullable: acc.nullable,
                example: acc.example,
            }
        })
        .collect();
    Some(Contract { fields: contract_fields })
}

fn to_api_endpoint(acc: &EndpointAccumulator) -> ApiEndpoint {
    ApiEndpoint {
        method: acc.method.clone(),
        normalized_path: acc.normalized_path.clone(),
        base_url: acc.base_url.clone(),
        service: detect_service(&acc.base_url),
        call_count: acc.call_count,
        first_seen: acc.first_seen,
        last_seen: acc.last_seen,
        auth: acc.auth.clone(),
        contract: infer_contract(&acc.samples),
        graphql_operation: acc.graphql_operation.clone(),
    }
}

/// Rebuilds the catalog from scratch by ingesting all network events,
/// running the refinement pass, then sorting by `callCount` descending.
pub fn get_catalog(events: &[RuntimeEvent]) -> Vec<ApiEndpoint> {
    let mut endpoints: Vec<ApiEndpoint> = refine(accumulate(events)).iter().map(|(_, acc)| to_api_endpoint(acc)).collect();
    endpoints.sort_by(|a, b| b.call_count.cmp(&a.call_count));
    endpoints
}

/// `{callCount, successRate, errorRate, avgLatency, p50/p95Latency, errorCodes}` per endpoint key.
pub fn get_health(events: &[RuntimeEvent]) -> HashMap<String, runtimescope_types::EndpointHealth> {
    refine(accumulate(events))
        .into_iter()
        .map(|(key, acc)| {
            let mut durations = acc.durations.clone();
            durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let success_rate = if acc.call_count == 0 {
                1.0
            } else {
                (acc.call_count - acc.error_count) as f64 / acc.call_count as f64
            };
            (
                key,
                runtimescope_types::EndpointHealth {
                    call_count: acc.call_count,
                    success_rate,
                    error_rate: 1.0 - success_rate,
                    avg_latency: mean(&durations),
                    p50_latency: percentile(&durations, 50.0),
                    p95_latency: percentile(&durations, 95.0),
                    error_codes: acc.error_codes,
                },
            )
        })
        .collect()
}

/// Aggregates endpoints sharing the same detected service.
pub fn get_service_map(events: &[RuntimeEvent]) -> Vec<ServiceMap> {
    let accumulated = refine(accumulate(events));
    let mut order: Vec<String> = Vec::new();
    let mut map: HashMap<String, ServiceMap> = HashMap::new();
    for (key, acc) in &accumulated {
        let service = detect_service(&acc.base_url);
        let entry = map.entry(service.clone()).or_insert_with(|| {
            order.push(service.clone());
            ServiceMap {
                service: service.clone(),
                endpoint_keys: Vec::new(),
                call_count: 0,
                total_duration: 0.0,
                error_count: 0,
                auth: acc.auth.clone(),
            }
        });
        entry.endpoint_keys.push(key.clone());
        entry.call_count += acc.call_count;
        entry.total_duration += acc.durations.iter().sum::<f64>();
        entry.error_count += acc.error_count;
    }
    order.into_iter().map(|s| map.remove(&s).unwrap()).collect()
}

fn make_issue(pattern: &str, key: &str, severity: Severity, title: impl Into<String>, description: impl Into<String>) -> DetectedIssue {
    DetectedIssue {
        id: format!("{pattern}:{key}"),
        pattern: pattern.to_string(),
        severity,
        title: title.into(),
        description: description.into(),
        evidence: Vec::new(),
        suggestion: None,
    }
}

/// Engine-produced issues.
pub fn detect_engine_issues(events: &[RuntimeEvent]) -> Vec<DetectedIssue> {
    let accumulated = refine(accumulate(events));
    let mut issues = Vec::new();

    for (key, acc) in &accumulated {
        if acc.call_count < 3 {
            continue;
        }
        let error_rate = acc.error_count as f64 / acc.call_count as f64;
        if error_rate > 0.5 {
            issues.push(make_issue(
                "api_degradation",
                key,
                Severity::Medium,
                format!("Elevated error rate on {key}"),
                format!("{key} failed {:.0}% of {} calls", error_rate * 100.0, acc.call_count),
            ));
        }
        let mut durations = acc.durations.clone();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let p95 = percentile(&durations, 95.0);
        if p95 > 5000.0 {
            issues.push(make_issue(
                "high_latency_endpoint",
                key,
                Severity::Medium,
                format!("High latency on {key}"),
                format!("{key} p95 latency is {p95:.0}ms"),
            ));
        }
    }

    let mut service_order: Vec<String> = Vec::new();
    let mut service_auth_types: HashMap<String, HashSet<AuthType>> = HashMap::new();
    for (_, acc) in &accumulated {
        let service = detect_service(&acc.base_url);
        let entry = service_auth_types.entry(service.clone()).or_insert_with(|| {
            service_order.push(service.clone());
            HashSet::new()
        });
        if acc.auth.auth_type != AuthType::None {
            entry.insert(acc.auth.auth_type);
        }
    }
    for service in service_order {
        let auth_types = &service_auth_types[&service];
        if auth_types.len() >= 2 {
            issues.push(make_issue(
                "auth_inconsistency",
                &service,
                Severity::Medium,
                format!("Inconsistent auth on {service}"),
                format!("{service} is called with {} different auth schemes", auth_types.len()),
            ));
        }
    }

    issues
}

/// Builds per-session catalogs and classifies each endpoint key as
/// `added`/`removed`/`modified`, diffing inferred contract shapes for
/// `modified` keys.
pub fn get_api_changes(events_a: &[RuntimeEvent], events_b: &[RuntimeEvent]) -> Vec<ApiChange> {
    let catalog_a: HashMap<String, ApiEndpoint> = get_catalog(events_a)
        .into_iter()
        .map(|e| (endpoint_key(&e.method, &e.base_url, &e.normalized_path), e))
        .collect();
    let catalog_b: HashMap<String, ApiEndpoint> = get_catalog(events_b)
        .into_iter()
        .map(|e| (endpoint_key(&e.method, &e.base_url, &e.normalized_path), e))
        .collect();

    let mut keys: Vec<String> = catalog_a.keys().cloned().collect();
    for key in catalog_b.keys() {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }

    let mut changes = Vec::new();
    for key in keys {
        match (catalog_a.get(&key), catalog_b.get(&key)) {
            (Some(_), None) => changes.push(ApiChange {
                endpoint_key: key,
                change: EndpointChangeKind::Removed,
                field_changes: Vec::new(),
            }),
            (None, Some(_)) => changes.push(ApiChange {
                endpoint_key: key,
                change: EndpointChangeKind::Added,
                field_changes: Vec::new(),
            }),
            (Some(a), Some(b)) => {
                let field_changes = diff_contracts(a.contract.as_ref(), b.contract.as_ref());
                if !field_changes.is_empty() {
                    changes.push(ApiChange {
                        endpoint_key: key,
                        change: EndpointChangeKind::Modified,
                        field_changes,
                    });
                }
            }
            (None, None) => unreachable!(),
        }
    }
    changes
}

fn diff_contracts(a: Option<&Contract>, b: Option<&Contract>) -> Vec<FieldChange> {
    let empty = Vec::new();
    let fields_a = a.map(|c| &c.fields).unwrap_or(&empty);
    let fields_b = b.map(|c| &c.fields).unwrap_or(&empty);

    let map_a: HashMap<&str, &ContractField> = fields_a.iter().map(|f| (f.path.as_str(), f)).collect();
    let map_b: HashMap<&str, &ContractField> = fields_b.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut paths: Vec<&str> = fields_a.iter().map(|f| f.path.as_str()).collect();
    for f in fields_b {
        if !paths.contains(&f.path.as_str()) {
            paths.push(&f.path);
        }
    }

    paths
        .into_iter()
        .filter_map(|path| match (map_a.get(path), map_b.get(path)) {
            (Some(_), None) => Some(FieldChange {
                path: path.to_string(),
                change: FieldChangeKind::Removed,
                old_type: None,
                new_type: None,
            }),
            (None, Some(field)) => Some(FieldChange {
                path: path.to_string(),
                change: FieldChangeKind::Added,
                old_type: None,
                new_type: Some(field.field_type.clone()),
            }),
            (Some(old), Some(new)) if old.field_type != new.field_type => Some(FieldChange {
                path: path.to_string(),
                change: FieldChangeKind::TypeChanged,
                old_type: Some(old.field_type.clone()),
                new_type: Some(new.field_type.clone()),
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_types::EventHeader;

    fn network(event_id: &str, ts: i64, url: &str) -> RuntimeEvent {
        RuntimeEvent::Network(NetworkEventFields {
            header: EventHeader {
                event_id: event_id.into(),
                session_id: "s1".into(),
                timestamp: ts,
            },
            url: url.into(),
            method: "GET".into(),
            status: Some(200),
            request_headers: Default::default(),
            response_headers: Default::default(),
            request_body_size: None,
            response_body_size: None,
            duration: Some(20.0),
            ttfb: None,
            request_body: None,
            response_body: None,
            error_phase: None,
            error_message: None,
            source: None,
            graphql_operation: None,
        })
    }

    #[test]
    fn normalize_path_replaces_numeric_and_uuid_segments() {
        assert_eq!(normalize_path("/users/42"), "/users/:id");
        assert_eq!(normalize_path("/users/550e8400-e29b-41d4-a716-446655440000"), "/users/:id");
        assert_eq!(normalize_path("/users/alice"), "/users/alice");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_path("/orders/507f1f77bcf86cd799439011/items/42");
        let twice = normalize_path(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn invalid_url_falls_back_to_unknown_base() {
        let (base, path) = normalize_url("not a url");
        assert_eq!(base, "unknown");
        assert_eq!(path, "not a url");
    }

    #[test]
    fn scenario_url_refinement_collapses_high_cardinality_segment() {
        let events: Vec<RuntimeEvent> = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]
            .iter()
            .enumerate()
            .map(|(i, name)| network(&format!("e{i}"), i as i64, &format!("https://api.com/users/{name}")))
            .collect();
        let catalog = get_catalog(&events);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].normalized_path, "/users/:id");
        assert_eq!(catalog[0].call_count, 6);
    }

    #[test]
    fn detect_service_recognizes_known_hosts() {
        assert_eq!(detect_service("xyz.supabase.co"), "Supabase");
        assert_eq!(detect_service("localhost"), "Your API");
        assert_eq!(detect_service("api.example.com"), "example.com");
    }

    #[test]
    fn detect_auth_recognizes_bearer_token() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc123".to_string());
        assert_eq!(detect_auth(&headers).auth_type, AuthType::Bearer);
    }
}
