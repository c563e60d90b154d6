/// Inline SQL migrations for the runtimescope database schema.
///
/// We use simple inline migrations rather than sqlx migration files because
/// the schema is small and self-contained.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: events table — one row per ingested RuntimeEvent, stored
    // as its full JSON envelope plus the columns queries filter on.
    r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    session_id TEXT NOT NULL,
    event_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    payload TEXT NOT NULL
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_project_session ON events(project, session_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_project_timestamp ON events(project, timestamp);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_events_project_type ON events(project, event_type);"#,
    // Migration 2: sessions table.
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    project TEXT NOT NULL,
    app_name TEXT NOT NULL,
    connected_at INTEGER NOT NULL,
    sdk_version TEXT NOT NULL,
    event_count INTEGER NOT NULL DEFAULT 0,
    is_connected INTEGER NOT NULL DEFAULT 1,
    disconnected_at INTEGER,
    build_meta TEXT
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project);"#,
    // Migration 3: session_metrics table — one row per computed SessionMetrics
    // snapshot, overwritten on recompute.
    r#"
CREATE TABLE IF NOT EXISTS session_metrics (
    session_id TEXT PRIMARY KEY REFERENCES sessions(session_id),
    project TEXT NOT NULL,
    metrics TEXT NOT NULL,
    saved_at INTEGER NOT NULL
);
"#,
];
