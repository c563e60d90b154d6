//! Persistent Log collaborator contract. `runtimescope-core` depends
//! only on this trait; `runtimescope-db` provides the SQLite implementation,
//! keeping SQL out of the analytics engines entirely.

use async_trait::async_trait;
use runtimescope_types::{RuntimeEvent, SessionInfo, SessionMetrics};
use thiserror::Error;

use crate::filters::EventLogFilter;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{0}")]
    Backend(String),
}

impl PersistError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

#[async_trait]
pub trait PersistentLog: Send + Sync {
    async fn add_event(&self, event: &RuntimeEvent, project: &str) -> Result<(), PersistError>;
    async fn save_session(&self, info: &SessionInfo, project: &str) -> Result<(), PersistError>;
    async fn update_session_disconnected(
        &self,
        session_id: &str,
        project: &str,
        ts: i64,
    ) -> Result<(), PersistError>;
    async fn save_session_metrics(
        &self,
        project: &str,
        metrics: &SessionMetrics,
    ) -> Result<(), PersistError>;
    async fn get_events(&self, filter: &EventLogFilter) -> Result<Vec<RuntimeEvent>, PersistError>;
    async fn get_event_count(&self, filter: &EventLogFilter) -> Result<u64, PersistError>;
    async fn get_sessions(&self, project: &str, limit: u64) -> Result<Vec<SessionInfo>, PersistError>;
    async fn close(&self) -> Result<(), PersistError>;
}
