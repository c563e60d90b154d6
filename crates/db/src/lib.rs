// crates/db/src/lib.rs
// SQLite-backed persistent log for the runtimescope daemon.
#![allow(clippy::too_many_arguments)]

mod migrations;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use runtimescope_core::filters::EventLogFilter;
use runtimescope_core::persistence::{PersistError, PersistentLog};
use runtimescope_types::{RuntimeEvent, SessionInfo, SessionMetrics};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, Row, SqlitePool};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("failed to determine cache directory")]
    NoCacheDir,

    #[error("failed to create database directory: {0}")]
    CreateDir(#[from] std::io::Error),

    #[error("failed to (de)serialize event payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for PersistError {
    fn from(err: DbError) -> Self {
        PersistError::backend(err.to_string())
    }
}

/// Main database handle wrapping a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn new(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30))
            .log_slow_statements(tracing::log::LevelFilter::Warn, std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

        let db = Self {
            pool,
            db_path: path.to_owned(),
        };
        db.run_migrations().await?;

        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    ///
    /// Uses `shared_cache(true)` so all pool connections share the same
    /// in-memory database.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .shared_cache(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;
        let db = Self {
            pool,
            db_path: PathBuf::new(),
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open the database at the default location: `~/.cache/runtimescope/runtimescope.db`
    pub async fn open_default() -> DbResult<Self> {
        let path = default_db_path()?;
        Self::new(&path).await
    }

    /// Run all inline migrations, tracked via a `_migrations` table so
    /// non-idempotent statements only execute once.
    async fn run_migrations(&self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version > current_version {
                sqlx::query(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Returns the default database path: `~/.cache/runtimescope/runtimescope.db`
pub fn default_db_path() -> DbResult<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("runtimescope").join("runtimescope.db"))
        .ok_or(DbError::NoCacheDir)
}

fn event_type_of(event: &RuntimeEvent) -> String {
    event.event_type().into_owned()
}

#[async_trait]
impl PersistentLog for Database {
    async fn add_event(&self, event: &RuntimeEvent, project: &str) -> Result<(), PersistError> {
        let payload = serde_json::to_string(event).map_err(DbError::from)?;
        sqlx::query(
            "INSERT INTO events (project, session_id, event_id, event_type, timestamp, payload) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(project)
        .bind(event.session_id())
        .bind(event.event_id())
        .bind(event_type_of(event))
        .bind(event.timestamp())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn save_session(&self, info: &SessionInfo, project: &str) -> Result<(), PersistError> {
        let build_meta = info.build_meta.as_ref().map(serde_json::to_string).transpose().map_err(DbError::from)?;
        sqlx::query(
            "INSERT INTO sessions (session_id, project, app_name, connected_at, sdk_version, event_count, \
             is_connected, disconnected_at, build_meta) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET \
             app_name = excluded.app_name, event_count = excluded.event_count, \
             is_connected = excluded.is_connected, disconnected_at = excluded.disconnected_at, \
             build_meta = excluded.build_meta",
        )
        .bind(&info.session_id)
        .bind(project)
        .bind(&info.app_name)
        .bind(info.connected_at)
        .bind(&info.sdk_version)
        .bind(info.event_count as i64)
        .bind(info.is_connected)
        .bind(info.disconnected_at)
        .bind(build_meta)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn update_session_disconnected(&self, session_id: &str, project: &str, ts: i64) -> Result<(), PersistError> {
        sqlx::query(
            "UPDATE sessions SET is_connected = 0, disconnected_at = ? WHERE session_id = ? AND project = ?",
        )
        .bind(ts)
        .bind(session_id)
        .bind(project)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn save_session_metrics(&self, project: &str, metrics: &SessionMetrics) -> Result<(), PersistError> {
        let payload = serde_json::to_string(metrics).map_err(DbError::from)?;
        sqlx::query(
            "INSERT INTO session_metrics (session_id, project, metrics, saved_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(session_id) DO UPDATE SET metrics = excluded.metrics, saved_at = excluded.saved_at",
        )
        .bind(&metrics.session_id)
        .bind(project)
        .bind(payload)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn get_events(&self, filter: &EventLogFilter) -> Result<Vec<RuntimeEvent>, PersistError> {
        let mut sql = "SELECT payload FROM events WHERE project = ?".to_string();
        if filter.session_id.is_some() {
            sql.push_str(" AND session_id = ?");
        }
        if let Some(types) = &filter.event_types {
            sql.push_str(&format!(" AND event_type IN ({})", vec!["?"; types.len()].join(",")));
        }
        if filter.since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.until.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(" ORDER BY timestamp ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(&filter.project);
        if let Some(session_id) = &filter.session_id {
            query = query.bind(session_id);
        }
        if let Some(types) = &filter.event_types {
            for t in types {
                query = query.bind(t);
            }
        }
        if let Some(since) = filter.since {
            query = query.bind(since);
        }
        if let Some(until) = filter.until {
            query = query.bind(until);
        }
        query = query.bind(filter.limit as i64).bind(filter.offset as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| {
                let payload: String = row.get("payload");
                serde_json::from_str(&payload).map_err(|e| PersistError::backend(e.to_string()))
            })
            .collect()
    }

    async fn get_event_count(&self, filter: &EventLogFilter) -> Result<u64, PersistError> {
        let mut sql = "SELECT COUNT(*) as count FROM events WHERE project = ?".to_string();
        if filter.session_id.is_some() {
            sql.push_str(" AND session_id = ?");
        }
        if let Some(types) = &filter.event_types {
            sql.push_str(&format!(" AND event_type IN ({})", vec!["?"; types.len()].join(",")));
        }
        if filter.since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.until.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }

        let mut query = sqlx::query(&sql).bind(&filter.project);
        if let Some(session_id) = &filter.session_id {
            query = query.bind(session_id);
        }
        if let Some(types) = &filter.event_types {
            for t in types {
                query = query.bind(t);
            }
        }
        if let Some(since) = filter.since {
            query = query.bind(since);
        }
        if let Some(until) = filter.until {
            query = query.bind(until);
        }

        let row = query.fetch_one(&self.pool).await.map_err(DbError::from)?;
        let count: i64 = row.get("count");
        Ok(count as u64)
    }

    async fn get_sessions(&self, project: &str, limit: u64) -> Result<Vec<SessionInfo>, PersistError> {
        let rows = sqlx::query(
            "SELECT session_id, app_name, connected_at, sdk_version, event_count, is_connected, \
             disconnected_at, build_meta FROM sessions WHERE project = ? \
             ORDER BY connected_at DESC LIMIT ?",
        )
        .bind(project)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| {
                let build_meta_json: Option<String> = row.get("build_meta");
                let build_meta = build_meta_json
                    .map(|s| serde_json::from_str(&s))
                    .transpose()
                    .map_err(|e: serde_json::Error| PersistError::backend(e.to_string()))?;
                Ok(SessionInfo {
                    session_id: row.get("session_id"),
                    app_name: row.get("app_name"),
                    connected_at: row.get("connected_at"),
                    sdk_version: row.get("sdk_version"),
                    event_count: row.get::<i64, _>("event_count") as u64,
                    is_connected: row.get("is_connected"),
                    disconnected_at: row.get("disconnected_at"),
                    build_meta,
                })
            })
            .collect()
    }

    async fn close(&self) -> Result<(), PersistError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_database_runs_migrations() {
        let db = Database::new_in_memory().await.expect("should create in-memory database");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events").fetch_one(db.pool()).await.unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::new_in_memory().await.expect("first open should succeed");
        db.run_migrations().await.expect("second migration run should succeed");
    }

    #[tokio::test]
    async fn file_based_database_creates_file_on_disk() {
        let tmp = tempfile::tempdir().expect("should create temp dir");
        let db_path = tmp.path().join("test.db");
        let _db = Database::new(&db_path).await.expect("should create file-based database");
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn save_and_fetch_session_round_trips() {
        let db = Database::new_in_memory().await.unwrap();
        let info = SessionInfo::new("s1".to_string(), "demo-app".to_string(), 1_000, "1.0.0".to_string());
        db.save_session(&info, "proj").await.unwrap();

        let sessions = db.get_sessions("proj", 10).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s1");
        assert!(sessions[0].is_connected);
    }

    #[tokio::test]
    async fn update_session_disconnected_flips_flag() {
        let db = Database::new_in_memory().await.unwrap();
        let info = SessionInfo::new("s1".to_string(), "demo-app".to_string(), 1_000, "1.0.0".to_string());
        db.save_session(&info, "proj").await.unwrap();
        db.update_session_disconnected("s1", "proj", 2_000).await.unwrap();

        let sessions = db.get_sessions("proj", 10).await.unwrap();
        assert!(!sessions[0].is_connected);
        assert_eq!(sessions[0].disconnected_at, Some(2_000));
    }
}
