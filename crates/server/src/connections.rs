// crates/server/src/connections.rs
//! Per-session outbound connection registry: `ConnectionMap =
//! Arc<RwLock<HashMap<sessionId, Sender>>>`. `std::sync::RwLock` rather
//! than a tokio lock, since `ConnectionGuard::drop` needs to remove an
//! entry without awaiting.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::ws::Message;
use tokio::sync::mpsc::UnboundedSender;

pub type OutboundSender = UnboundedSender<Message>;

#[derive(Clone, Default)]
pub struct ConnectionMap {
    inner: Arc<RwLock<HashMap<String, OutboundSender>>>,
}

impl ConnectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: String, sender: OutboundSender) {
        self.inner.write().expect("connection map poisoned").insert(session_id, sender);
    }

    pub fn remove(&self, session_id: &str) {
        self.inner.write().expect("connection map poisoned").remove(session_id);
    }

    pub fn get(&self, session_id: &str) -> Option<OutboundSender> {
        self.inner.read().expect("connection map poisoned").get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("connection map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard bound to a live WebSocket task. Removing the connection from
/// [`ConnectionMap`] happens in `Drop` so a panic or a cancelled task (e.g.
/// during server shutdown) can never leak a registration — a direct
/// structural borrow of a WebSocket connection guard.
/// The async disconnect bookkeeping (marking the session disconnected in
/// the store, persisting `disconnectedAt`, firing disconnect callbacks)
/// can't run inside a synchronous `Drop`, so it's handed off to a detached
/// task the guard spawns on drop.
pub struct ConnectionGuard<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    connections: ConnectionMap,
    session_id: std::sync::Mutex<Option<String>>,
    on_drop: Arc<F>,
}

impl<F> ConnectionGuard<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    pub fn new(connections: ConnectionMap, on_drop: Arc<F>) -> Self {
        Self {
            connections,
            session_id: std::sync::Mutex::new(None),
            on_drop,
        }
    }

    /// Registers the connection under `session_id` once the handshake
    /// arrives. Before this is called the guard is inert.
    pub fn bind(&self, session_id: String, sender: OutboundSender) {
        self.connections.insert(session_id.clone(), sender);
        *self.session_id.lock().expect("guard mutex poisoned") = Some(session_id);
    }
}

impl<F> Drop for ConnectionGuard<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let Some(session_id) = self.session_id.lock().expect("guard mutex poisoned").take() else {
            return;
        };
        self.connections.remove(&session_id);
        (self.on_drop)(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn guard_removes_entry_and_fires_callback_on_drop() {
        let connections = ConnectionMap::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();

        {
            let guard = ConnectionGuard::new(connections.clone(), Arc::new(move |_sid: String| fired_clone.store(true, Ordering::SeqCst)));
            guard.bind("s1".to_string(), tx);
            assert_eq!(connections.len(), 1);
        }

        assert_eq!(connections.len(), 0);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn unbound_guard_is_a_no_op_on_drop() {
        let connections = ConnectionMap::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        drop(ConnectionGuard::new(connections, Arc::new(move |_sid: String| fired_clone.store(true, Ordering::SeqCst))));
        assert!(!fired.load(Ordering::SeqCst));
    }
}
