// crates/server/src/error.rs
use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API/tool errors.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Errors surfaced by the outbound command path.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("no active connection")]
    NoActiveConnection,

    #[error("timed out after {0}ms")]
    TimedOut(u64),

    #[error("failed to send command: {0}")]
    SendFailed(String),

    #[error("connection closed before responding")]
    Cancelled,
}

/// Errors surfaced by the tool adapter's HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("persistent log error: {0}")]
    Persist(#[from] runtimescope_core::PersistError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::UnknownProject(project) => {
                tracing::warn!(project = %project, "unknown project requested");
                (StatusCode::NOT_FOUND, ErrorResponse::with_details("unknown project", project.clone()))
            }
            ApiError::UnknownTool(tool) => {
                tracing::warn!(tool = %tool, "unknown tool requested");
                (StatusCode::NOT_FOUND, ErrorResponse::with_details("unknown tool", tool.clone()))
            }
            ApiError::InvalidParams(message) => {
                tracing::warn!(message = %message, "invalid tool params");
                (StatusCode::BAD_REQUEST, ErrorResponse::with_details("invalid params", message.clone()))
            }
            ApiError::Transport(err) => {
                tracing::warn!(error = %err, "command failed");
                (StatusCode::GATEWAY_TIMEOUT, ErrorResponse::with_details("command failed", err.to_string()))
            }
            ApiError::Persist(err) => {
                tracing::error!(error = %err, "persistent log error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::new("persistent log error"))
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unknown_project_returns_404() {
        let (status, body) = extract(ApiError::UnknownProject("demo".into()).into_response()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.details.unwrap().contains("demo"));
    }

    #[tokio::test]
    async fn transport_timeout_returns_504() {
        let err = ApiError::Transport(TransportError::TimedOut(200));
        let (status, body) = extract(err.into_response()).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body.details.unwrap().contains("200ms"));
    }
}
