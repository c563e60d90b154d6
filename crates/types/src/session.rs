//! Session registry types.

use serde::{Deserialize, Serialize};

use crate::event::BuildMeta;

/// Per-session registration info, keyed by `sessionId`.
///
/// Created by a `session` event; `isConnected` is toggled by the transport
/// on client close. Persists after disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub app_name: String,
    pub connected_at: i64,
    pub sdk_version: String,
    pub event_count: u64,
    pub is_connected: bool,
    pub disconnected_at: Option<i64>,
    pub build_meta: Option<BuildMeta>,
}

impl SessionInfo {
    pub fn new(session_id: String, app_name: String, connected_at: i64, sdk_version: String) -> Self {
        Self {
            session_id,
            app_name,
            connected_at,
            sdk_version,
            event_count: 0,
            is_connected: true,
            disconnected_at: None,
            build_meta: None,
        }
    }
}
