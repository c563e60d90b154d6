// crates/server/src/main.rs
//! runtimescope daemon binary.
//!
//! Opens the shared persistent log, builds the transport+tool app, and
//! serves it until `ctrl_c`. Logging/error-reporting init is delegated to
//! `runtimescope-observability` rather than inlined.

use std::sync::Arc;

use anyhow::Result;
use runtimescope_db::Database;
use runtimescope_server::{create_app, transport, ProjectRegistry, ServerState, TransportConfig};

#[tokio::main]
async fn main() -> Result<()> {
    runtimescope_observability::init_tracing();
    let _sentry_guard = runtimescope_observability::init_error_reporting();

    let config = TransportConfig::from_env();

    let db_path = runtimescope_db::default_db_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::new(&db_path).await?;
    tracing::info!(path = %db_path.display(), "opened persistent log");

    let registry = ProjectRegistry::new(Arc::new(db), config.buffer_size);
    let state = Arc::new(ServerState::new(config, registry));

    let app = create_app(state.clone());
    transport::serve(state, app).await?;

    Ok(())
}
