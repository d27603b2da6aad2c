//! Backends against an in-process fake provider

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use expense_agent_config::LlmSettings;
use expense_agent_llm::{
    cancel_pair, GenerateRequest, LlmBackend, LlmError, LlmFactory, ModelRole, OllamaBackend,
    OllamaConfig, OpenAIBackend, OpenAIConfig, StructuredRequest,
};

#[derive(Clone, Default)]
struct Recorder {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn fake_ollama(recorder: Recorder, reply: &'static str) -> Router {
    Router::new()
        .route(
            "/api/generate",
            post(move |State(rec): State<Recorder>, Json(body): Json<Value>| async move {
                rec.bodies.lock().unwrap().push(body);
                Json(json!({ "model": "llama3.2", "response": reply, "done": true }))
            }),
        )
        .route("/api/tags", get(|| async { Json(json!({ "models": [] })) }))
        .with_state(recorder)
}

fn fake_openai(recorder: Recorder, reply: &'static str) -> Router {
    Router::new()
        .route(
            "/v1/chat/completions",
            post(move |State(rec): State<Recorder>, Json(body): Json<Value>| async move {
                rec.bodies.lock().unwrap().push(body);
                Json(json!({
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": reply } }]
                }))
            }),
        )
        .route("/v1/models", get(|| async { Json(json!({ "data": [] })) }))
        .with_state(recorder)
}

#[tokio::test]
async fn test_ollama_structured_round_trip() {
    let recorder = Recorder::default();
    let base = spawn(fake_ollama(recorder.clone(), "{\"intent\": \"add_expense\"}")).await;

    let backend = OllamaBackend::new(OllamaConfig::new(&base).with_models("extract-m", "validate-m")).unwrap();
    assert!(backend.is_available().await);

    let request = StructuredRequest::new(
        GenerateRequest::new("Extract")
            .with_system("You extract")
            .with_role(ModelRole::Validation),
    )
    .with_schema(json!({ "type": "object" }));

    let value = backend.generate_structured(request).await.unwrap();
    assert_eq!(value, json!({ "intent": "add_expense" }));

    let bodies = recorder.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["model"], "validate-m");
    assert_eq!(body["stream"], false);
    assert_eq!(body["format"], "json");
    assert_eq!(body["system"], "You extract");
    assert_eq!(body["options"]["num_predict"], 500);
    assert!(body["prompt"]
        .as_str()
        .unwrap()
        .starts_with("Extract\n\nRespond with valid JSON only.\n\nJSON Schema:\n"));
}

#[tokio::test]
async fn test_ollama_raw_generate_has_no_format() {
    let recorder = Recorder::default();
    let base = spawn(fake_ollama(recorder.clone(), "food")).await;
    let backend = OllamaBackend::new(OllamaConfig::new(&base)).unwrap();

    let text = backend
        .generate(&GenerateRequest::new("Categorize").with_max_tokens(10))
        .await
        .unwrap();
    assert_eq!(text, "food");

    let bodies = recorder.bodies.lock().unwrap();
    assert!(bodies[0].get("format").is_none());
    assert!(bodies[0].get("system").is_none());
    assert_eq!(bodies[0]["options"]["num_predict"], 10);
}

#[tokio::test]
async fn test_openai_compatible_request() {
    let recorder = Recorder::default();
    let base = spawn(fake_openai(recorder.clone(), "```json\n{\"is_valid\": true}\n```")).await;

    let config = OpenAIConfig::groq("gsk_test", "llama-3.1-8b-instant").with_endpoint(format!("{}/v1", base));
    let backend = OpenAIBackend::new(config).unwrap();
    assert!(backend.is_available().await);

    let value = backend
        .generate_structured(StructuredRequest::new(GenerateRequest::new("Validate").with_system("rules")))
        .await
        .unwrap();
    assert_eq!(value, json!({ "is_valid": true }));

    let bodies = recorder.bodies.lock().unwrap();
    let body = &bodies[0];
    assert_eq!(body["model"], "llama-3.1-8b-instant");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["max_tokens"], 500);
}

#[tokio::test]
async fn test_non_success_status_is_rejected() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
    );
    let base = spawn(app).await;

    let backend =
        OpenAIBackend::new(OpenAIConfig::openai("sk-bad", "gpt-4o-mini").with_endpoint(format!("{}/v1", base)))
            .unwrap();
    let err = backend.generate(&GenerateRequest::new("hi")).await.unwrap_err();
    assert_eq!(
        err,
        LlmError::BackendRejected {
            status: 401,
            body: "invalid api key".to_string()
        }
    );
    assert!(!backend.is_available().await);
}

#[tokio::test]
async fn test_malformed_json_reply() {
    let base = spawn(fake_ollama(Recorder::default(), "I think it was lunch")).await;
    let backend = OllamaBackend::new(OllamaConfig::new(&base)).unwrap();

    let err = backend
        .generate_structured(StructuredRequest::new(GenerateRequest::new("x")))
        .await
        .unwrap_err();
    match err {
        LlmError::MalformedStructuredOutput { raw, .. } => assert_eq!(raw, "I think it was lunch"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_and_unreachable() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "response": "{}" }))
        }),
    );
    let base = spawn(app).await;

    let backend =
        OllamaBackend::new(OllamaConfig::new(&base).with_timeout(Duration::from_millis(100))).unwrap();
    let err = backend.generate(&GenerateRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, LlmError::BackendTimeout(_)), "got {err:?}");

    // Nothing listens on port 9 locally
    let backend = OllamaBackend::new(OllamaConfig::new("http://127.0.0.1:9")).unwrap();
    let err = backend.generate(&GenerateRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, LlmError::BackendUnavailable(_)), "got {err:?}");
    assert!(!backend.is_available().await);
}

#[tokio::test]
async fn test_cancellation_aborts_request() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "response": "{}" }))
        }),
    );
    let base = spawn(app).await;
    let backend = OllamaBackend::new(OllamaConfig::new(&base)).unwrap();

    let (handle, signal) = cancel_pair();
    let request = GenerateRequest::new("x").with_cancel(Some(signal));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let started = std::time::Instant::now();
    let err = backend.generate(&request).await.unwrap_err();
    assert_eq!(err, LlmError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_factory_credential_from_environment() {
    let settings = LlmSettings::default().with_provider("openai");

    std::env::remove_var("OPENAI_API_KEY");
    let err = LlmFactory::select_backend(&settings).unwrap_err();
    assert_eq!(
        err,
        LlmError::MissingCredential {
            provider: "openai".to_string(),
            env_var: "OPENAI_API_KEY".to_string()
        }
    );

    std::env::set_var("OPENAI_API_KEY", "sk-from-env");
    let handle = LlmFactory::select_backend(&settings).unwrap();
    assert_eq!(handle.api_key.as_deref(), Some("sk-from-env"));
    std::env::remove_var("OPENAI_API_KEY");
}
