//! Wire/domain model for runtime events ingested from SDK clients.
//!
//! Every event on the wire is a single flat JSON object carrying an
//! `eventType` discriminator alongside header fields (`eventId`, `sessionId`,
//! `timestamp`) and variant-specific fields. `RuntimeEvent` models this as a
//! Rust enum with a hand-written `Serialize`/`Deserialize` pair rather than
//! `#[serde(tag = "eventType")]`, because unrecognized `eventType` values
//! (and the open `recon_*` family) must round-trip instead of failing to
//! parse.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Fields shared by every event, regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub event_id: String,
    pub session_id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkErrorPhase {
    Error,
    Abort,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkSource {
    Fetch,
    Xhr,
    NodeHttp,
    NodeHttps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphqlOperationType {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlOperation {
    #[serde(rename = "type")]
    pub op_type: GraphqlOperationType,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub url: String,
    pub method: String,
    pub status: Option<u16>,
    #[serde(default)]
    pub request_headers: HashMap<String, String>,
    #[serde(default)]
    pub response_headers: HashMap<String, String>,
    pub request_body_size: Option<u64>,
    pub response_body_size: Option<u64>,
    pub duration: Option<f64>,
    pub ttfb: Option<f64>,
    pub request_body: Option<Value>,
    pub response_body: Option<Value>,
    pub error_phase: Option<NetworkErrorPhase>,
    pub error_message: Option<String>,
    pub source: Option<NetworkSource>,
    pub graphql_operation: Option<GraphqlOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub level: ConsoleLevel,
    pub message: String,
    #[serde(default)]
    pub args: Vec<Value>,
    pub stack_trace: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMeta {
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub build_time: Option<String>,
    pub deploy_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub app_name: String,
    pub connected_at: i64,
    pub sdk_version: String,
    pub build_meta: Option<BuildMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreLibrary {
    Zustand,
    Redux,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatePhase {
    Init,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub from: Value,
    pub to: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub store_id: String,
    pub library: StoreLibrary,
    pub phase: StatePhase,
    pub state: Value,
    pub previous_state: Option<Value>,
    #[serde(default)]
    pub diff: HashMap<String, DiffEntry>,
    pub action: Option<StateAction>,
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPhase {
    Mount,
    Update,
    Unmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderCause {
    Props,
    State,
    Context,
    Parent,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderComponentProfile {
    pub component_name: String,
    pub render_count: u32,
    pub total_duration: f64,
    pub avg_duration: f64,
    pub last_render_phase: RenderPhase,
    pub last_render_cause: RenderCause,
    pub render_velocity: f64,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub profiles: Vec<RenderComponentProfile>,
    pub snapshot_window_ms: u64,
    pub total_renders: u64,
    #[serde(default)]
    pub suspicious_components: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalRating {
    Good,
    #[serde(rename = "needs-improvement")]
    NeedsImprovement,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub metric_name: String,
    pub value: f64,
    pub rating: Option<VitalRating>,
    pub unit: Option<String>,
    pub element: Option<String>,
    pub entries: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DbOperation {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbSource {
    Prisma,
    Drizzle,
    Knex,
    Pg,
    Mysql2,
    #[serde(rename = "better-sqlite3")]
    BetterSqlite3,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub query: String,
    pub normalized_query: String,
    pub duration: f64,
    pub rows_returned: Option<u64>,
    pub rows_affected: Option<u64>,
    #[serde(default)]
    pub tables_accessed: Vec<String>,
    pub operation: DbOperation,
    pub source: DbSource,
    pub error: Option<String>,
    pub label: Option<String>,
    pub stack_trace: Option<String>,
    pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshotEventFields {
    #[serde(flatten)]
    pub header: EventHeader,
    pub payload: Value,
}

/// A `recon_*` event — opaque payload ingested and round-tripped verbatim.
/// `kind` is the suffix after `recon_` (`scan`, `computed_styles`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconEvent {
    pub header: EventHeader,
    pub kind: String,
    pub raw: Value,
}

/// An event whose `eventType` is not one of the closed variants below. The
/// ring faithfully replays these to observers that understand newer
/// variants instead of dropping them.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherEvent {
    pub header: EventHeader,
    pub event_type: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    Network(NetworkEventFields),
    Console(ConsoleEventFields),
    Session(SessionEventFields),
    State(StateEventFields),
    Render(RenderEventFields),
    Performance(PerformanceEventFields),
    Database(DatabaseEventFields),
    DomSnapshot(DomSnapshotEventFields),
    Recon(ReconEvent),
    Other(OtherEvent),
}

impl RuntimeEvent {
    pub fn header(&self) -> &EventHeader {
        match self {
            RuntimeEvent::Network(e) => &e.header,
            RuntimeEvent::Console(e) => &e.header,
            RuntimeEvent::Session(e) => &e.header,
            RuntimeEvent::State(e) => &e.header,
            RuntimeEvent::Render(e) => &e.header,
            RuntimeEvent::Performance(e) => &e.header,
            RuntimeEvent::Database(e) => &e.header,
            RuntimeEvent::DomSnapshot(e) => &e.header,
            RuntimeEvent::Recon(e) => &e.header,
            RuntimeEvent::Other(e) => &e.header,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.header().event_id
    }

    pub fn session_id(&self) -> &str {
        &self.header().session_id
    }

    pub fn timestamp(&self) -> i64 {
        self.header().timestamp
    }

    pub fn event_type(&self) -> Cow<'_, str> {
        match self {
            RuntimeEvent::Network(_) => Cow::Borrowed("network"),
            RuntimeEvent::Console(_) => Cow::Borrowed("console"),
            RuntimeEvent::Session(_) => Cow::Borrowed("session"),
            RuntimeEvent::State(_) => Cow::Borrowed("state"),
            RuntimeEvent::Render(_) => Cow::Borrowed("render"),
            RuntimeEvent::Performance(_) => Cow::Borrowed("performance"),
            RuntimeEvent::Database(_) => Cow::Borrowed("database"),
            RuntimeEvent::DomSnapshot(_) => Cow::Borrowed("dom_snapshot"),
            RuntimeEvent::Recon(e) => Cow::Owned(format!("recon_{}", e.kind)),
            RuntimeEvent::Other(e) => Cow::Borrowed(e.event_type.as_str()),
        }
    }
}

impl Serialize for RuntimeEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The catch-all variants store their raw JSON object verbatim
        // (including `eventType`), so they serialize directly.
        match self {
            RuntimeEvent::Recon(e) => e.raw.serialize(serializer),
            RuntimeEvent::Other(e) => e.raw.serialize(serializer),
            _ => {
                let (tag, value) = match self {
                    RuntimeEvent::Network(e) => ("network", serde_json::to_value(e)),
                    RuntimeEvent::Console(e) => ("console", serde_json::to_value(e)),
                    RuntimeEvent::Session(e) => ("session", serde_json::to_value(e)),
                    RuntimeEvent::State(e) => ("state", serde_json::to_value(e)),
                    RuntimeEvent::Render(e) => ("render", serde_json::to_value(e)),
                    RuntimeEvent::Performance(e) => ("performance", serde_json::to_value(e)),
                    RuntimeEvent::Database(e) => ("database", serde_json::to_value(e)),
                    RuntimeEvent::DomSnapshot(e) => ("dom_snapshot", serde_json::to_value(e)),
                    RuntimeEvent::Recon(_) | RuntimeEvent::Other(_) => unreachable!(),
                };
                let mut value = value.map_err(serde::ser::Error::custom)?;
                if let Value::Object(map) = &mut value {
                    map.insert("eventType".to_string(), Value::String(tag.to_string()));
                }
                value.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for RuntimeEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let event_type = value
            .get("eventType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DeError::custom("missing eventType"))?
            .to_string();

        macro_rules! parse_as {
            ($variant:ident, $fields:ty) => {
                serde_json::from_value::<$fields>(value.clone())
                    .map(RuntimeEvent::$variant)
                    .map_err(DeError::custom)
            };
        }

        match event_type.as_str() {
            "network" => parse_as!(Network, NetworkEventFields),
            "console" => parse_as!(Console, ConsoleEventFields),
            "session" => parse_as!(Session, SessionEventFields),
            "state" => parse_as!(State, StateEventFields),
            "render" => parse_as!(Render, RenderEventFields),
            "performance" => parse_as!(Performance, PerformanceEventFields),
            "database" => parse_as!(Database, DatabaseEventFields),
            "dom_snapshot" => parse_as!(DomSnapshot, DomSnapshotEventFields),
            other if other.starts_with("recon_") => {
                let header = serde_json::from_value::<EventHeader>(value.clone())
                    .map_err(DeError::custom)?;
                let kind = other.trim_start_matches("recon_").to_string();
                Ok(RuntimeEvent::Recon(ReconEvent {
                    header,
                    kind,
                    raw: value,
                }))
            }
            other => {
                let header = serde_json::from_value::<EventHeader>(value.clone())
                    .map_err(DeError::custom)?;
                Ok(RuntimeEvent::Other(OtherEvent {
                    header,
                    event_type: other.to_string(),
                    raw: value,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_json(status: u16, method: &str) -> Value {
        serde_json::json!({
            "eventId": "e1",
            "sessionId": "s1",
            "timestamp": 1000,
            "eventType": "network",
            "url": "https://api.com/x",
            "method": method,
            "status": status,
        })
    }

    #[test]
    fn round_trips_known_variant() {
        let json = network_json(200, "GET");
        let event: RuntimeEvent = serde_json::from_value(json.clone()).unwrap();
        assert!(matches!(event, RuntimeEvent::Network(_)));
        assert_eq!(event.event_type(), "network");
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["status"], 200);
        assert_eq!(back["eventType"], "network");
    }

    #[test]
    fn unknown_event_type_falls_back_to_other() {
        let json = serde_json::json!({
            "eventId": "e2",
            "sessionId": "s1",
            "timestamp": 2000,
            "eventType": "future_thing",
            "custom": "value",
        });
        let event: RuntimeEvent = serde_json::from_value(json.clone()).unwrap();
        match &event {
            RuntimeEvent::Other(o) => assert_eq!(o.event_type, "future_thing"),
            _ => panic!("expected Other variant"),
        }
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn recon_event_round_trips_verbatim() {
        let json = serde_json::json!({
            "eventId": "e3",
            "sessionId": "s1",
            "timestamp": 3000,
            "eventType": "recon_computed_styles",
            "selector": "#app",
        });
        let event: RuntimeEvent = serde_json::from_value(json.clone()).unwrap();
        match &event {
            RuntimeEvent::Recon(r) => assert_eq!(r.kind, "computed_styles"),
            _ => panic!("expected Recon variant"),
        }
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn missing_event_type_errors() {
        let json = serde_json::json!({"eventId": "e4", "sessionId": "s1", "timestamp": 1});
        let result: Result<RuntimeEvent, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
