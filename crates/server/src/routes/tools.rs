// crates/server/src/routes/tools.rs
//! `POST /api/tools/:name` -- thin HTTP front door onto the tool adapter
//! (`crate::tools`). One route, dispatching on the path segment, rather
//! than one route per tool — the uniform envelope makes that the natural
//! shape.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::ServerState;
use crate::tools;

async fn call_tool(State(state): State<Arc<ServerState>>, Path(name): Path<String>, Json(body): Json<Value>) -> ApiResult<Json<runtimescope_types::ToolResponse>> {
    let params = tools::parse_params(body)?;
    let response = tools::dispatch(&name, &state, &params)?;
    Ok(Json(response))
}

pub fn router() -> Router<Arc<ServerState>> {
    Router::new().route("/tools/{name}", post(call_tool))
}
