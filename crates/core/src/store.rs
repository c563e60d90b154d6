//! Event Store: Ring + session index + optional Persistent Log,
//! exposing typed filtered queries over buffered events.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use runtimescope_types::{
    BuildMeta, ConsoleEventFields, DatabaseEventFields, DomSnapshotEventFields, NetworkEventFields,
    PerformanceEventFields, ReconEvent, RenderEventFields, RuntimeEvent, SessionInfo, StateEventFields,
};
use tracing::warn;

use crate::filters::EventFilter;
use crate::persistence::PersistentLog;
use crate::ring::Ring;
use crate::stats::wire_str;

/// Registered callback invoked synchronously, in registration order, on
/// every `add_event`. Compared by `Arc` pointer identity for removal — never
/// by structural equality.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RuntimeEvent);
}

struct Inner {
    ring: Ring<RuntimeEvent>,
    sessions: HashMap<String, SessionInfo>,
}

pub struct EventStore {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
    persistent_log: Option<Arc<dyn PersistentLog>>,
    project: String,
}

impl EventStore {
    pub fn new(capacity: usize, project: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ring: Ring::new(capacity),
                sessions: HashMap::new(),
            }),
            listeners: Mutex::new(Vec::new()),
            persistent_log: None,
            project: project.into(),
        }
    }

    pub fn with_persistent_log(mut self, log: Arc<dyn PersistentLog>) -> Self {
        self.persistent_log = Some(log);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Push to the ring, update the session index, dual-write to the
    /// persistent log (best-effort, never fatal), and fan out to listeners.
    /// Never blocks on I/O: the persistent write is spawned onto the tokio
    /// runtime rather than awaited here.
    pub fn add_event(&self, event: RuntimeEvent) {
        let session_id = event.session_id().to_string();

        {
            let mut inner = self.inner.lock().expect("event store mutex poisoned");

            if let RuntimeEvent::Session(fields) = &event {
                inner
                    .sessions
                    .entry(session_id.clone())
                    .and_modify(|existing| {
                        existing.app_name = fields.app_name.clone();
                        existing.sdk_version = fields.sdk_version.clone();
                        existing.build_meta = fields.build_meta.clone();
                        existing.is_connected = true;
                        existing.disconnected_at = None;
                    })
                    .or_insert_with(|| {
                        let mut info = SessionInfo::new(
                            session_id.clone(),
                            fields.app_name.clone(),
                            fields.connected_at,
                            fields.sdk_version.clone(),
                        );
                        info.build_meta = fields.build_meta.clone();
                        info
                    });
            }

            if let Some(session) = inner.sessions.get_mut(&session_id) {
                session.event_count += 1;
            }

            inner.ring.push(event.clone());
        }

        if let Some(log) = self.persistent_log.clone() {
            let project = self.project.clone();
            let event_for_log = event.clone();
            tokio::spawn(async move {
                if let Err(err) = log.add_event(&event_for_log, &project).await {
                    warn!(project = %project, event_type = %event_for_log.event_type(), error = %err, "persistent log write failed");
                }
            });
        }

        let listeners = self.listeners.lock().expect("listener mutex poisoned").clone();
        for listener in listeners.iter() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if result.is_err() {
                warn!("event listener panicked; continuing with remaining listeners");
            }
        }
    }

    pub fn on_event(&self, listener: Arc<dyn EventListener>) {
        self.listeners.lock().expect("listener mutex poisoned").push(listener);
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn EventListener>) {
        let mut listeners = self.listeners.lock().expect("listener mutex poisoned");
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    pub fn mark_disconnected(&self, session_id: &str, timestamp: i64) {
        let mut inner = self.inner.lock().expect("event store mutex poisoned");
        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.is_connected = false;
            session.disconnected_at = Some(timestamp);
        }
    }

    pub fn session(&self, session_id: &str) -> Option<SessionInfo> {
        self.inner
            .lock()
            .expect("event store mutex poisoned")
            .sessions
            .get(session_id)
            .cloned()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.inner
            .lock()
            .expect("event store mutex poisoned")
            .sessions
            .values()
            .cloned()
            .collect()
    }

    /// Oldest -> newest, unfiltered.
    pub fn get_all_events(&self) -> Vec<RuntimeEvent> {
        self.inner.lock().expect("event store mutex poisoned").ring.to_owned_vec()
    }

    /// Strictly by timestamp ascending, ties broken by insertion order.
    pub fn get_event_timeline(&self, filter: &EventFilter, now_ms: i64) -> Vec<RuntimeEvent> {
        let mut events = self.get_all_events();
        events.retain(|e| filter.timestamp_ok(e.timestamp(), now_ms));
        events.sort_by_key(|e| e.timestamp());
        events
    }

    pub fn get_network_requests(&self, filter: &EventFilter, now_ms: i64) -> Vec<NetworkEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Network(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Network(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && EventFilter::substring_ok(&filter.url_pattern, &f.url)
                    && filter
                        .status
                        .map(|s| f.status == Some(s))
                        .unwrap_or(true)
                    && filter
                        .method
                        .as_ref()
                        .map(|m| m.eq_ignore_ascii_case(&f.method))
                        .unwrap_or(true)
                    && filter.min_duration_ms.map(|min| f.duration.unwrap_or(0.0) >= min).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn get_console_messages(&self, filter: &EventFilter, now_ms: i64) -> Vec<ConsoleEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Console(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Console(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && EventFilter::substring_ok(&filter.search, &f.message)
                    && filter
                        .level
                        .as_ref()
                        .map(|lvl| wire_str(&f.level).eq_ignore_ascii_case(lvl))
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn get_state_events(&self, filter: &EventFilter, now_ms: i64) -> Vec<StateEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::State(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::State(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && filter
                        .store_id
                        .as_ref()
                        .map(|s| s == &f.store_id)
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn get_render_events(&self, filter: &EventFilter, now_ms: i64) -> Vec<RenderEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Render(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Render(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && filter
                        .component_name
                        .as_ref()
                        .map(|name| {
                            f.profiles
                                .iter()
                                .any(|p| p.component_name.to_lowercase().contains(&name.to_lowercase()))
                        })
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn get_performance_metrics(&self, filter: &EventFilter, now_ms: i64) -> Vec<PerformanceEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Performance(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Performance(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && filter
                        .metric_name
                        .as_ref()
                        .map(|name| name == &f.metric_name)
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn get_database_events(&self, filter: &EventFilter, now_ms: i64) -> Vec<DatabaseEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Database(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Database(f) => Some(f),
                _ => None,
            })
            .filter(|f| {
                filter.timestamp_ok(f.header.timestamp, now_ms)
                    && filter
                        .table
                        .as_ref()
                        .map(|t| f.tables_accessed.iter().any(|accessed| accessed.to_lowercase().contains(&t.to_lowercase())))
                        .unwrap_or(true)
                    && filter
                        .operation
                        .as_ref()
                        .map(|op| wire_str(&f.operation).eq_ignore_ascii_case(op))
                        .unwrap_or(true)
                    && filter
                        .source
                        .as_ref()
                        .map(|src| wire_str(&f.source).eq_ignore_ascii_case(src))
                        .unwrap_or(true)
                    && filter.min_duration_ms.map(|min| f.duration >= min).unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// Most recent `dom_snapshot` matching the filter, or `None`.
    pub fn get_latest_dom_snapshot(&self, filter: &EventFilter, now_ms: i64) -> Option<DomSnapshotEventFields> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::DomSnapshot(_)))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::DomSnapshot(f) => Some(f),
                _ => None,
            })
            .find(|f| filter.timestamp_ok(f.header.timestamp, now_ms))
            .cloned()
    }

    /// All `recon_<kind>` events, newest-first.
    pub fn get_recon_events(&self, kind: &str, filter: &EventFilter, now_ms: i64) -> Vec<ReconEvent> {
        let inner = self.inner.lock().expect("event store mutex poisoned");
        inner
            .ring
            .query(|e| matches!(e, RuntimeEvent::Recon(r) if r.kind == kind))
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::Recon(r) => Some(r),
                _ => None,
            })
            .filter(|r| filter.timestamp_ok(r.header.timestamp, now_ms))
            .cloned()
            .collect()
    }

    /// Most recent `recon_<kind>` event matching the filter, or `None`.
    pub fn get_latest_recon(&self, kind: &str, filter: &EventFilter, now_ms: i64) -> Option<ReconEvent> {
        self.get_recon_events(kind, filter, now_ms).into_iter().next()
    }

    /// Empties the ring and the session index; returns the number of events cleared.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().expect("event store mutex poisoned");
        let cleared = inner.ring.clear();
        inner.sessions.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtimescope_types::{EventHeader, SessionEventFields};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session_event(session_id: &str, event_id: &str, ts: i64) -> RuntimeEvent {
        RuntimeEvent::Session(SessionEventFields {
            header: EventHeader {
                event_id: event_id.into(),
                session_id: session_id.into(),
                timestamp: ts,
            },
            app_name: "demo-app".into(),
            connected_at: ts,
            sdk_version: "1.0.0".into(),
            build_meta: None::<BuildMeta>,
        })
    }

    fn network_event(session_id: &str, event_id: &str, ts: i64, url: &str, status: u16) -> RuntimeEvent {
        RuntimeEvent::Network(NetworkEventFields {
            header: EventHeader {
                event_id: event_id.into(),
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

    #[test]
    fn session_registration_is_idempotent_and_preserves_event_count() {
        let store = EventStore::new(100, "demo");
        store.add_event(session_event("s1", "e1", 1000));
        store.add_event(network_event("s1", "e2", 1001, "https://api.com/x", 200));
        store.add_event(session_event("s1", "e3", 1002));

        let info = store.session("s1").unwrap();
        assert_eq!(info.event_count, 3);
    }

    #[test]
    fn event_count_equals_sum_of_session_event_counts() {
        let store = EventStore::new(100, "demo");
        store.add_event(session_event("s1", "e1", 1000));
        store.add_event(session_event("s2", "e2", 1000));
        store.add_event(network_event("s1", "e3", 1001, "https://api.com/x", 200));
        store.add_event(network_event("s2", "e4", 1002, "https://api.com/y", 200));
        store.add_event(network_event("s2", "e5", 1003, "https://api.com/y", 200));

        let total: u64 = store.sessions().iter().map(|s| s.event_count).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn filtered_network_queries_are_subsets_of_get_all_events() {
        let store = EventStore::new(100, "demo");
        store.add_event(network_event("s1", "e1", 1000, "https://api.com/x", 500));
        store.add_event(network_event("s1", "e2", 1001, "https://api.com/y", 200));

        let filter = EventFilter {
            status: Some(500),
            ..Default::default()
        };
        let failed = store.get_network_requests(&filter, 2000);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, Some(500));

        let all = store.get_all_events();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn listener_panic_does_not_block_remaining_listeners() {
        struct Panicky;
        impl EventListener for Panicky {
            fn on_event(&self, _event: &RuntimeEvent) {
                panic!("boom");
            }
        }
        struct Counter(Arc<AtomicUsize>);
        impl EventListener for Counter {
            fn on_event(&self, _event: &RuntimeEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let store = EventStore::new(10, "demo");
        let count = Arc::new(AtomicUsize::new(0));
        store.on_event(Arc::new(Panicky));
        store.on_event(Arc::new(Counter(count.clone())));

        store.add_event(session_event("s1", "e1", 1000));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_event_listener_uses_pointer_identity() {
        struct NoOp;
        impl EventListener for NoOp {
            fn on_event(&self, _event: &RuntimeEvent) {}
        }
        let store = EventStore::new(10, "demo");
        let listener: Arc<dyn EventListener> = Arc::new(NoOp);
        store.on_event(listener.clone());
        assert_eq!(store.listeners.lock().unwrap().len(), 1);
        store.remove_event_listener(&listener);
        assert_eq!(store.listeners.lock().unwrap().len(), 0);
    }

    #[test]
    fn clear_empties_ring_and_sessions() {
        let store = EventStore::new(10, "demo");
        store.add_event(session_event("s1", "e1", 1000));
        store.add_event(network_event("s1", "e2", 1001, "https://api.com/x", 200));
        let cleared = store.clear();
        assert_eq!(cleared, 2);
        assert!(store.get_all_events().is_empty());
        assert!(store.sessions().is_empty());
    }
}
