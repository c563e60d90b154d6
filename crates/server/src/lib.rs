// crates/server/src/lib.rs
//! runtimescope server library.
//!
//! Provides the Axum-based WebSocket transport that ingests `RuntimeEvent`s
//! from SDK clients, and the thin tool-adapter HTTP surface an AI coding
//! assistant calls to run the analytics engines.

pub mod config;
pub mod connections;
pub mod error;
pub mod pending;
pub mod registry;
pub mod routes;
pub mod state;
pub mod tools;
pub mod transport;

pub use config::TransportConfig;
pub use error::*;
pub use registry::ProjectRegistry;
pub use routes::api_routes;
pub use state::ServerState;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// CORS restricted to localhost origins. The WebSocket transport itself
/// assumes local loopback and does no authentication, but the HTTP tool
/// surface still shouldn't let an arbitrary webpage read ingested events
/// via `fetch()`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _req_parts: &axum::http::request::Parts| {
                if let Ok(origin) = origin.to_str() {
                    origin.starts_with("http://localhost:")
                        || origin.starts_with("http://127.0.0.1:")
                        || origin == "http://localhost"
                        || origin == "http://127.0.0.1"
                } else {
                    false
                }
            },
        ))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the full application: `/ws` transport endpoint plus `/api/*`
/// tool adapter routes, with compression/CORS/tracing layers.
pub fn create_app(state: Arc<ServerState>) -> Router {
    Router::new()
        .merge(transport::router())
        .nest("/api", api_routes())
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use runtimescope_db::Database;
    use tower::ServiceExt;

    async fn test_state() -> Arc<ServerState> {
        let db = Database::new_in_memory().await.expect("in-memory db");
        let registry = ProjectRegistry::new(Arc::new(db), 100);
        Arc::new(ServerState::new(TransportConfig::default(), registry))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_app(test_state().await);
        let (status, body) = get(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn unknown_tool_returns_404() {
        let app = create_app(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tools/not_a_real_tool")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn detect_issues_tool_returns_empty_on_unknown_project() {
        let app = create_app(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tools/detect_issues")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"project":"demo"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_localhost_origin() {
        let app = create_app(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let allow_origin = response.headers().get("access-control-allow-origin");
        assert_eq!(allow_origin.unwrap(), "http://localhost:5173");
    }

    #[tokio::test]
    async fn cors_rejects_external_origin() {
        let app = create_app(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "https://evil.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }
}
