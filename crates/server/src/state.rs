// crates/server/src/state.rs
//! Shared transport state: connection registry, pending commands, the
//! project->EventStore registry, and session->project routing. One
//! `ServerState` is constructed per process and wrapped in an `Arc` for
//! axum's `State` extractor.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use runtimescope_core::EventStore;
use runtimescope_types::SessionInfo;

use crate::config::TransportConfig;
use crate::connections::ConnectionMap;
use crate::pending::PendingCommands;
use crate::registry::ProjectRegistry;

pub type DisconnectCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ServerState {
    pub config: TransportConfig,
    pub registry: ProjectRegistry,
    pub connections: ConnectionMap,
    pub pending: PendingCommands,
    session_projects: RwLock<HashMap<String, String>>,
    disconnect_callbacks: RwLock<Vec<DisconnectCallback>>,
    started_at: Instant,
}

impl ServerState {
    pub fn new(config: TransportConfig, registry: ProjectRegistry) -> Self {
        Self {
            config,
            registry,
            connections: ConnectionMap::new(),
            pending: PendingCommands::new(),
            session_projects: RwLock::new(HashMap::new()),
            disconnect_callbacks: RwLock::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Associates a session with the project it handshook as, so a later
    /// bare `event` batch (which carries only `sessionId`) can be routed to
    /// the right `EventStore`.
    pub fn bind_session_project(&self, session_id: &str, project: &str) {
        self.session_projects
            .write()
            .expect("session map poisoned")
            .insert(session_id.to_string(), project.to_string());
    }

    pub fn project_for_session(&self, session_id: &str) -> Option<String> {
        self.session_projects.read().expect("session map poisoned").get(session_id).cloned()
    }

    pub fn store_for_session(&self, session_id: &str) -> Option<Arc<EventStore>> {
        let project = self.project_for_session(session_id)?;
        self.registry.get(&project)
    }

    pub fn on_disconnect(&self, callback: DisconnectCallback) {
        self.disconnect_callbacks.write().expect("callback list poisoned").push(callback);
    }

    /// Marks the session disconnected in its project's store and in the
    /// persistent log, then fires every registered disconnect callback.
    /// Callback errors are swallowed — they run behind
    /// `catch_unwind` exactly like the `EventStore` listener fan-out.
    pub async fn handle_disconnect(&self, session_id: &str, timestamp: i64) {
        let Some(project) = self.project_for_session(session_id) else {
            return;
        };
        if let Some(store) = self.registry.get(&project) {
            store.mark_disconnected(session_id, timestamp);
        }
        if let Err(err) = self.registry.persistent_log().update_session_disconnected(session_id, &project, timestamp).await {
            tracing::warn!(session_id = %session_id, project = %project, error = %err, "failed to persist disconnect");
        }

        let callbacks = self.disconnect_callbacks.read().expect("callback list poisoned").clone();
        for callback in callbacks.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(session_id)));
            if result.is_err() {
                tracing::warn!("disconnect callback panicked; continuing with remaining callbacks");
            }
        }
    }

    pub async fn persist_session(&self, info: &SessionInfo, project: &str) {
        if let Err(err) = self.registry.persistent_log().save_session(info, project).await {
            tracing::warn!(session_id = %info.session_id, project = %project, error = %err, "failed to persist session");
        }
    }
}
