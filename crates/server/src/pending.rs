// crates/server/src/pending.rs
//! Outbound command pending map: requestId -> a waiter holding a response
//! channel plus an implicit timeout.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct PendingCommands {
    waiters: Mutex<HashMap<String, oneshot::Sender<Value>>>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `request_id`. `requestId`s are caller-supplied
    /// and must be unique while pending; a collision silently
    /// replaces the previous waiter, which will then never be resolved.
    pub fn register(&self, request_id: String) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().expect("pending map poisoned").insert(request_id, tx);
        rx
    }

    /// Delivers `payload` to the waiter registered for `request_id`, if
    /// still pending. Returns `true` if a waiter was found.
    pub fn resolve(&self, request_id: &str, payload: Value) -> bool {
        let sender = self.waiters.lock().expect("pending map poisoned").remove(request_id);
        match sender {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Removes a waiter without resolving it (on timeout or send failure).
    pub fn remove(&self, request_id: &str) {
        self.waiters.lock().expect("pending map poisoned").remove(request_id);
    }

    /// Drops every pending waiter, causing their receivers to observe a
    /// closed channel. Called on process shutdown.
    pub fn fail_all(&self) {
        self.waiters.lock().expect("pending map poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().expect("pending map poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_delivers_to_registered_waiter() {
        let pending = PendingCommands::new();
        let rx = pending.register("r1".to_string());
        assert!(pending.resolve("r1", serde_json::json!({"html": "<div>"})));
        let value = rx.try_recv().unwrap();
        assert_eq!(value["html"], "<div>");
    }

    #[test]
    fn resolve_on_unknown_request_id_returns_false() {
        let pending = PendingCommands::new();
        assert!(!pending.resolve("missing", serde_json::json!(null)));
    }

    #[test]
    fn fail_all_clears_every_waiter() {
        let pending = PendingCommands::new();
        let rx1 = pending.register("r1".to_string());
        let rx2 = pending.register("r2".to_string());
        pending.fail_all();
        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        assert_eq!(pending.len(), 0);
    }
}
