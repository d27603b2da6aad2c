//! Expense Agent Server
//!
//! HTTP endpoints over the two-stage expense pipeline.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler, record_http_request};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tokio::net::TcpListener;

use expense_agent_config::ServerConfig;
use expense_agent_core::FailureKind;

/// Bind the configured host and port
///
/// The host may be a name such as `localhost`; it is resolved rather
/// than parsed as a literal address.
pub async fn bind_listener(server: &ServerConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind((server.host.as_str(), server.port)).await
}

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Backend(_) => StatusCode::BAD_GATEWAY,
            ServerError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::from(self), Json(body)).into_response()
    }
}

/// HTTP status for a failed pipeline run
pub fn status_for_failure(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
        FailureKind::IntentUnknown | FailureKind::WrongIntent | FailureKind::ValidationRejected => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FailureKind::BackendUnavailable
        | FailureKind::BackendRejected
        | FailureKind::MalformedStructuredOutput => StatusCode::BAD_GATEWAY,
        FailureKind::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}
