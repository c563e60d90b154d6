// crates/server/src/routes/mod.rs
use std::sync::Arc;

use axum::Router;

use crate::state::ServerState;

pub mod health;
pub mod tools;

/// Builds the `/api/*` sub-router: health check plus the tool adapter.
pub fn api_routes() -> Router<Arc<ServerState>> {
    Router::new().merge(health::router()).merge(tools::router())
}
