//! HTTP Endpoints
//!
//! REST API for the expense pipeline.

use std::str::FromStr;
use std::time::{Duration, Instant};

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use expense_agent_core::{
    get_schema, list_action_schemas, Category, FailureKind, InputMethod, PipelineResult,
};
use expense_agent_llm::LlmError;

use crate::metrics::{metrics_handler, record_http_request};
use crate::state::AppState;
use crate::{status_for_failure, ServerError};

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.request_timeout_secs);

    Router::new()
        // Expense endpoints
        .route("/api/v1/expenses/parse", post(parse_expense))
        .route("/api/v1/expenses/categorize", post(categorize_expense))
        // Schema endpoints
        .route("/api/v1/schemas/actions", get(list_actions))
        .route("/api/v1/schemas/:name", get(get_schema_by_name))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        if !origins.is_empty() {
            tracing::error!("All configured CORS origins are invalid, falling back to localhost");
        } else {
            tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        }
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static(DEFAULT_ORIGIN))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Parse request
#[derive(Debug, Deserialize)]
struct ParseRequest {
    input_text: String,
    #[serde(default = "default_input_method")]
    input_method: String,
}

fn default_input_method() -> String {
    "text".to_string()
}

/// Run the two-stage pipeline over one utterance
async fn parse_expense(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> (StatusCode, Json<PipelineResult>) {
    let start = Instant::now();

    let result = match InputMethod::from_str(&request.input_method) {
        Ok(method) => {
            state
                .pipeline
                .process_expense_input(&request.input_text, method)
                .await
        },
        Err(e) => PipelineResult::failure(FailureKind::InvalidInput, e.to_string()),
    };

    let status = match result.error_kind {
        None => StatusCode::OK,
        Some(kind) => status_for_failure(kind),
    };

    record_http_request("parse", status, start.elapsed().as_secs_f64());
    (status, Json(result))
}

/// Categorize request
#[derive(Debug, Deserialize)]
struct CategorizeRequest {
    description: String,
}

/// Categorize response
#[derive(Debug, Serialize)]
struct CategorizeResponse {
    category: Category,
}

/// Map a description onto one of the fixed categories
async fn categorize_expense(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<CategorizeResponse>, ServerError> {
    let start = Instant::now();

    if request.description.trim().is_empty() {
        record_http_request("categorize", StatusCode::BAD_REQUEST, start.elapsed().as_secs_f64());
        return Err(ServerError::InvalidRequest(
            "description must not be empty".to_string(),
        ));
    }

    let outcome = state
        .pipeline
        .categorize(&request.description, None)
        .await
        .map(|category| Json(CategorizeResponse { category }))
        .map_err(|e| {
            tracing::error!(error = %e, "Categorization failed");
            backend_error(e)
        });

    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(ServerError::BackendTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        Err(_) => StatusCode::BAD_GATEWAY,
    };
    record_http_request("categorize", status, start.elapsed().as_secs_f64());

    outcome
}

fn backend_error(err: LlmError) -> ServerError {
    match err {
        LlmError::BackendTimeout(_) => ServerError::BackendTimeout(err.to_string()),
        other => ServerError::Backend(other.to_string()),
    }
}

/// Callable action schemas as function definitions
async fn list_actions() -> Json<serde_json::Value> {
    let actions: Vec<serde_json::Value> = list_action_schemas()
        .into_iter()
        .map(|schema| schema.to_function_definition())
        .collect();

    Json(serde_json::json!({
        "count": actions.len(),
        "actions": actions,
    }))
}

/// One schema rendered as JSON Schema
async fn get_schema_by_name(
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let schema = get_schema(&name).map_err(|e| ServerError::NotFound(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "name": schema.name.as_str(),
        "description": schema.description,
        "schema": schema.to_json_schema(),
    })))
}

/// Backend reachability plus the selected provider
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let backend = state.pipeline.backend();
    let available = backend.is_available().await;

    if !available {
        tracing::warn!(provider = backend.provider(), "LLM backend is not reachable");
    }

    let status = if available { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(serde_json::json!({
            "status": if available { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "provider": backend.provider(),
            "model": backend.model_name(),
            "backend_available": available,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use expense_agent_config::Settings;
    use expense_agent_pipeline::testing::MockBackend;

    #[test]
    fn test_router_creation() {
        let state = AppState::new(Settings::default(), Arc::new(MockBackend::new()));
        let _ = create_router(state);
    }

    #[test]
    fn test_cors_layer_variants() {
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&[], false);
        let _ = build_cors_layer(&["https://app.example.com".to_string()], true);
        let _ = build_cors_layer(&["bad\norigin".to_string()], true);
    }
}
