//! Router-level tests over a scripted backend

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use expense_agent_config::Settings;
use expense_agent_llm::LlmError;
use expense_agent_pipeline::testing::MockBackend;
use expense_agent_server::{create_router, AppState};

fn app(backend: MockBackend) -> Router {
    create_router(AppState::new(Settings::default(), Arc::new(backend)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn movie_extraction() -> Value {
    json!({
        "intent": "add_expense",
        "extracted_data": {
            "amount": 25,
            "category": "entertainment",
            "description": "movie tickets",
            "date": "2024-01-15",
            "confidence": 0.8
        }
    })
}

#[tokio::test]
async fn test_parse_success() {
    let backend = MockBackend::new()
        .with_extraction_json(movie_extraction())
        .with_validation_json(json!({
            "is_valid": true,
            "validated_data": {
                "amount": 25,
                "category": "entertainment",
                "description": "Movie tickets",
                "date": "2024-01-15"
            },
            "errors": []
        }));

    let (status, body) = send(
        app(backend),
        post_json(
            "/api/v1/expenses/parse",
            json!({"input_text": "Movie tickets twenty five", "input_method": "voice"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["input_method"], "voice");
    assert_eq!(body["data"]["normalized_fields"]["category"], "entertainment");
    assert_eq!(body["data"]["normalized_fields"]["description"], "Movie tickets");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_parse_wrong_intent_is_unprocessable() {
    let backend = MockBackend::new().with_extraction_json(json!({
        "intent": "set_budget",
        "extracted_data": {"amount": 500, "category": "food", "confidence": 0.9}
    }));

    let (status, body) = send(
        app(backend),
        post_json(
            "/api/v1/expenses/parse",
            json!({"input_text": "Set my food budget to 500 a month"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "This pipeline only handles expenses, got intent: set_budget");
    assert_eq!(body["error_kind"], "wrong_intent");
}

#[tokio::test]
async fn test_parse_validation_rejected() {
    let backend = MockBackend::new()
        .with_extraction_json(movie_extraction())
        .with_validation_json(json!({
            "is_valid": false,
            "errors": ["Amount is implausible", "Date is in the future"]
        }));

    let (status, body) = send(
        app(backend),
        post_json("/api/v1/expenses/parse", json!({"input_text": "tickets"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"],
        "Validation failed: Amount is implausible; Date is in the future"
    );
}

#[tokio::test]
async fn test_parse_empty_input_is_bad_request() {
    let backend = Arc::new(MockBackend::new());
    let router = create_router(AppState::new(Settings::default(), backend.clone()));

    let (status, body) = send(
        router,
        post_json("/api/v1/expenses/parse", json!({"input_text": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_kind"], "invalid_input");
    assert_eq!(backend.extraction_calls(), 0);
}

#[tokio::test]
async fn test_parse_unknown_input_method() {
    let (status, body) = send(
        app(MockBackend::new()),
        post_json(
            "/api/v1/expenses/parse",
            json!({"input_text": "coffee 4 dollars", "input_method": "fax"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("fax"));
}

#[tokio::test]
async fn test_parse_backend_failures() {
    let backend = MockBackend::new()
        .with_extraction_reply(Err(LlmError::BackendUnavailable("connection refused".into())));
    let (status, body) = send(
        app(backend),
        post_json("/api/v1/expenses/parse", json!({"input_text": "lunch 12"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to extract expense data: "));

    let backend = MockBackend::new()
        .with_extraction_reply(Err(LlmError::BackendTimeout("30s elapsed".into())));
    let (status, body) = send(
        app(backend),
        post_json("/api/v1/expenses/parse", json!({"input_text": "lunch 12"})),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error_kind"], "backend_timeout");

    let backend = MockBackend::new().with_extraction_reply(Ok("not json at all".into()));
    let (status, body) = send(
        app(backend),
        post_json("/api/v1/expenses/parse", json!({"input_text": "lunch 12"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error_kind"], "malformed_structured_output");
}

#[tokio::test]
async fn test_categorize() {
    let backend = MockBackend::new().with_raw_reply(Ok(" Transportation.\n".into()));
    let (status, body) = send(
        app(backend),
        post_json(
            "/api/v1/expenses/categorize",
            json!({"description": "uber to the airport"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "transportation");
}

#[tokio::test]
async fn test_categorize_errors() {
    let (status, _) = send(
        app(MockBackend::new()),
        post_json("/api/v1/expenses/categorize", json!({"description": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let backend = MockBackend::new()
        .with_raw_reply(Err(LlmError::BackendUnavailable("connection refused".into())));
    let (status, body) = send(
        app(backend),
        post_json("/api/v1/expenses/categorize", json!({"description": "rent"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_action_schemas() {
    let (status, body) = send(app(MockBackend::new()), get("/api/v1/schemas/actions")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let names: Vec<&str> = body["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["add_expense", "set_budget"]);
    assert_eq!(body["actions"][0]["parameters"]["type"], "object");
}

#[tokio::test]
async fn test_schema_lookup() {
    let (status, body) = send(app(MockBackend::new()), get("/api/v1/schemas/extraction")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "extraction");
    assert!(body["schema"]["properties"]["intent"].is_object());

    let (status, body) = send(app(MockBackend::new()), get("/api/v1/schemas/refund")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("refund"));
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(MockBackend::new()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["provider"], "mock");
    assert_eq!(body["model"], "mock-model");
    assert_eq!(body["backend_available"], true);

    let (status, body) = send(app(MockBackend::new().unavailable()), get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["backend_available"], false);
}

#[tokio::test]
async fn test_metrics_disabled_without_recorder() {
    let response = app(MockBackend::new()).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
