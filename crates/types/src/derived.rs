//! Derived entities computed by the analytics engines from buffered
//! events. These are ephemeral / rebuilt on each query unless a component
//! caches them explicitly with invalidation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    // Ord derives in declaration order: High < Medium < Low.
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    Basic,
    ApiKey,
    Cookie,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthInfo {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractField {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub nullable: bool,
    pub example: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub fields: Vec<ContractField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlOperationSummary {
    #[serde(rename = "type")]
    pub op_type: String,
    pub name: Option<String>,
}

/// `{method, normalizedPath, baseUrl, service, callCount, firstSeen, lastSeen, auth, contract?, graphqlOperation?}`
/// keyed by `(method, normalizedPath, baseUrl)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub method: String,
    pub normalized_path: String,
    pub base_url: String,
    pub service: String,
    pub call_count: u64,
    pub first_seen: i64,
    pub last_seen: i64,
    pub auth: AuthInfo,
    pub contract: Option<Contract>,
    pub graphql_operation: Option<GraphqlOperationSummary>,
}

/// Per-endpoint health stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointHealth {
    pub call_count: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    pub avg_latency: f64,
    pub p50_latency: f64,
    pub p95_latency: f64,
    pub error_codes: HashMap<String, u64>,
}

/// Aggregate across endpoints sharing a detected `service`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMap {
    pub service: String,
    pub endpoint_keys: Vec<String>,
    pub call_count: u64,
    pub total_duration: f64,
    pub error_count: u64,
    pub auth: AuthInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldChangeKind {
    Added,
    Removed,
    TypeChanged,
}

/// One contract-field-level change within a `modified` endpoint
/// "Change detection").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub path: String,
    pub change: FieldChangeKind,
    pub old_type: Option<String>,
    pub new_type: Option<String>,
}

/// `getApiChanges(sessionA, sessionB)` result entry, keyed by endpoint key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiChange {
    pub endpoint_key: String,
    pub change: EndpointChangeKind,
    pub field_changes: Vec<FieldChange>,
}

/// `{normalizedQuery, tables, operation, callCount, avg/max/p95/totalDuration, avgRowsReturned}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedQueryStats {
    pub normalized_query: String,
    pub tables: Vec<String>,
    pub operation: String,
    pub call_count: u64,
    pub avg_duration: f64,
    pub max_duration: f64,
    pub p95_duration: f64,
    pub total_duration: f64,
    pub avg_rows_returned: f64,
}

/// `{id, pattern, severity, title, description, evidence, suggestion?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIssue {
    pub id: String,
    pub pattern: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: Vec<Value>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMetrics {
    pub avg_latency: f64,
    pub error_rate: f64,
    pub call_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetrics {
    pub render_count: u32,
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetrics {
    pub update_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVitalMetrics {
    pub value: f64,
    pub rating: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    pub avg_duration: f64,
    pub call_count: u64,
}

/// Per-session aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub session_id: String,
    pub connected_at: i64,
    pub disconnected_at: i64,
    pub total_events: u64,
    pub error_count: u64,
    pub endpoints: HashMap<String, EndpointMetrics>,
    pub components: HashMap<String, ComponentMetrics>,
    pub stores: HashMap<String, StoreMetrics>,
    pub web_vitals: HashMap<String, WebVitalMetrics>,
    pub queries: HashMap<String, QueryMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaClassification {
    Regression,
    Improvement,
    Unchanged,
}

/// `{key, before, after, delta, percentChange, classification}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub key: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub percent_change: f64,
    pub classification: DeltaClassification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexImpact {
    High,
    Medium,
    Low,
}

/// An index candidate emitted by `suggestIndexes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSuggestion {
    pub table: String,
    pub columns: Vec<String>,
    pub sample_query: String,
    pub duration: f64,
    pub estimated_impact: IndexImpact,
}

/// Result of `compareSessions(a, b)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionComparison {
    pub endpoint_deltas: Vec<MetricDelta>,
    pub component_deltas: Vec<MetricDelta>,
    pub store_deltas: Vec<MetricDelta>,
    pub vital_deltas: Vec<MetricDelta>,
    pub query_deltas: Vec<MetricDelta>,
    pub error_count_delta: i64,
    pub total_events_delta: i64,
}
