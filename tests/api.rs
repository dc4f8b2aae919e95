//! In-process HTTP API tests.
//!
//! The router is driven with `tower::ServiceExt::oneshot` over the in-memory
//! store. Generation goes either through a stub [`Generator`] or through the
//! real [`ChatCompletionsGenerator`] pointed at a stub model server bound to
//! `127.0.0.1:0`.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

use item_rag::config::{Config, GenerationConfig};
use item_rag::generation::{ChatCompletionsGenerator, GenerationError, Generator};
use item_rag::report::MIME_DOCX;
use item_rag::server::{router, AppState};
use item_rag_core::store::memory::InMemoryItemStore;
use item_rag_core::store::ItemStore;

// ============ helpers ============

struct StubGenerator {
    answer: Option<String>,
}

#[async_trait]
impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.answer.clone().ok_or(GenerationError::EmptyResponse)
    }
}

fn app_with(store: Arc<InMemoryItemStore>, generator: Arc<dyn Generator>) -> Router {
    router(AppState::new(store, generator, Config::minimal()))
}

fn app() -> (Arc<InMemoryItemStore>, Router) {
    let store = Arc::new(InMemoryItemStore::new());
    let generator = Arc::new(StubGenerator {
        answer: Some("Stub answer.".to_string()),
    });
    (store.clone(), app_with(store, generator))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn item(name: &str, description: &str, price: f64) -> Value {
    json!({ "name": name, "description": description, "price": price })
}

/// Concatenated `<w:t>` text of a generated docx.
fn docx_text(bytes: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_str(&xml);
    let mut in_text = false;
    loop {
        match reader.read_event().unwrap() {
            quick_xml::events::Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            quick_xml::events::Event::End(e) if e.local_name().as_ref() == b"t" => {
                in_text = false;
                out.push('\n');
            }
            quick_xml::events::Event::Text(t) if in_text => {
                out.push_str(&t.unescape().unwrap());
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
    }
    out
}

/// Starts a stub chat-completions server and returns its URL.
async fn spawn_model_server(reply: Value, delay: Duration) -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let reply = reply.clone();
            async move {
                assert_eq!(body["messages"][0]["role"], "user");
                tokio::time::sleep(delay).await;
                Json(reply)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1/chat/completions", addr)
}

fn generation_config(url: String, timeout_secs: u64) -> GenerationConfig {
    GenerationConfig {
        url,
        model: "test-model".to_string(),
        timeout_secs,
        connect_timeout_secs: 1,
        api_key_env: None,
    }
}

// ============ root / health ============

#[tokio::test]
async fn root_returns_welcome_message() {
    let (_, app) = app();
    let (status, body) = send_json(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().starts_with("Welcome"));
}

#[tokio::test]
async fn health_reports_version() {
    let (_, app) = app();
    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (_, app) = app();
    let (status, body) = send_json(&app, Method::GET, "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

// ============ items CRUD ============

#[tokio::test]
async fn create_then_get_returns_input_plus_id() {
    let (_, app) = app();
    let input = item("Widget", "red widget", 9.99);
    let (status, created) = send_json(&app, Method::POST, "/items/", Some(input.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, fetched) = send_json(&app, Method::GET, &format!("/items/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());
    assert_eq!(fetched["name"], input["name"]);
    assert_eq!(fetched["description"], input["description"]);
    assert_eq!(fetched["price"], input["price"]);
}

#[tokio::test]
async fn create_with_custom_id_and_duplicate_conflict() {
    let (_, app) = app();
    let (status, created) = send_json(
        &app,
        Method::POST,
        "/items/?custom_id=sku-1",
        Some(item("a", "b", 1.0)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], "sku-1");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/items/?custom_id=sku-1",
        Some(item("c", "d", 2.0)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    let (_, fetched) = send_json(&app, Method::GET, "/items/sku-1", None).await;
    assert_eq!(fetched["name"], "a");
}

#[tokio::test]
async fn create_rejects_invalid_payload_and_custom_id() {
    let (store, app) = app();
    let (status, body) = send_json(
        &app,
        Method::POST,
        "/items/",
        Some(json!({ "name": "a", "price": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation");

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/items/",
        Some(json!({ "name": "a", "description": "b", "price": "cheap" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/items/?custom_id=bad%20id",
        Some(item("a", "b", 1.0)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(store.is_empty());
}

#[tokio::test]
async fn integer_price_is_accepted() {
    let (_, app) = app();
    let (status, created) =
        send_json(&app, Method::POST, "/items", Some(json!({ "name": "a", "description": "b", "price": 3 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["price"].as_f64(), Some(3.0));
}

#[tokio::test]
async fn list_items_in_insertion_order_capped_at_page_size() {
    let (store, app) = app();
    for n in 0..105 {
        store
            .insert(
                &serde_json::from_value(item(&format!("n{}", n), "d", 1.0)).unwrap(),
                None,
            )
            .await
            .unwrap();
    }
    let (status, body) = send_json(&app, Method::GET, "/items/", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 100);
    assert_eq!(items[0]["name"], "n0");
    assert_eq!(items[99]["name"], "n99");
}

#[tokio::test]
async fn put_replaces_and_missing_id_is_404_without_creating() {
    let (store, app) = app();
    let (_, created) = send_json(&app, Method::POST, "/items/", Some(item("a", "b", 1.0))).await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = send_json(
        &app,
        Method::PUT,
        &format!("/items/{}", id),
        Some(item("a2", "b2", 2.5)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated, json!({ "id": id, "name": "a2", "description": "b2", "price": 2.5 }));

    let (status, body) = send_json(
        &app,
        Method::PUT,
        "/items/does-not-exist",
        Some(item("x", "y", 1.0)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Item not found");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn delete_twice_is_200_then_404() {
    let (_, app) = app();
    let (_, created) = send_json(&app, Method::POST, "/items/", Some(item("a", "b", 1.0))).await;
    let uri = format!("/items/{}", created["id"].as_str().unwrap());

    let (status, deleted) = send_json(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, created);

    let (status, _) = send_json(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_a_clean_error() {
    let (_, app) = app();
    let long_uri = format!("/items/{}", "x".repeat(65));
    for uri in ["/items/bad$id", "/items/a%20b", "/items/%FF", long_uri.as_str()] {
        for method in [Method::GET, Method::DELETE] {
            let (status, body) = send_json(&app, method.clone(), uri, None).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{} {}", method, uri);
            assert_eq!(body["error"]["code"], "validation");
        }
    }

    // Invalid UTF-8 in the path segment is rejected the same way on PUT.
    let (status, body) =
        send_json(&app, Method::PUT, "/items/%FF", Some(item("a", "b", 1.0))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation");
}

// ============ /generate_docx_from_query/ ============

async fn seed_widget_and_gadget(app: &Router) {
    send_json(app, Method::POST, "/items/", Some(item("Widget", "red widget", 9.99))).await;
    send_json(app, Method::POST, "/items/", Some(item("Gadget", "blue gadget", 4.5))).await;
}

#[tokio::test]
async fn generate_docx_streams_document() {
    let (_, app) = app();
    seed_widget_and_gadget(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/generate_docx_from_query/?word=widget")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], MIME_DOCX);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Model_Response.docx\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!bytes.is_empty());
    let text = docx_text(&bytes);
    assert!(text.contains("Model Response"));
    assert!(text.contains("Query: widget"));
    assert!(text.contains("Model Answer: Stub answer."));
}

#[tokio::test]
async fn generate_docx_without_matches_is_404() {
    let (_, app) = app();
    seed_widget_and_gadget(&app).await;
    let (status, body) =
        send_json(&app, Method::GET, "/generate_docx_from_query/?word=gizmo", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "No items found with the given word in description"
    );
}

#[tokio::test]
async fn generate_docx_requires_word() {
    let (_, app) = app();
    seed_widget_and_gadget(&app).await;
    for uri in ["/generate_docx_from_query/", "/generate_docx_from_query/?word=%20"] {
        let (status, body) = send_json(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "uri: {}", uri);
        assert_eq!(body["error"]["code"], "validation");
    }
}

#[tokio::test]
async fn generate_docx_empty_model_answer_is_502() {
    let store = Arc::new(InMemoryItemStore::new());
    let app = app_with(store, Arc::new(StubGenerator { answer: None }));
    seed_widget_and_gadget(&app).await;
    let (status, body) =
        send_json(&app, Method::GET, "/generate_docx_from_query/?word=widget", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

// ============ against a stub model server ============

#[tokio::test]
async fn end_to_end_with_stub_model_server() {
    let url = spawn_model_server(
        json!({ "choices": [{ "message": { "role": "assistant", "content": "Red widgets are popular." } }] }),
        Duration::ZERO,
    )
    .await;
    let generator = Arc::new(ChatCompletionsGenerator::new(&generation_config(url, 10)).unwrap());
    let app = app_with(Arc::new(InMemoryItemStore::new()), generator);
    seed_widget_and_gadget(&app).await;

    let (status, bytes) =
        send(&app, Method::GET, "/generate_docx_from_query/?word=WIDGET", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = docx_text(&bytes);
    assert!(text.contains("Query: WIDGET"));
    assert!(text.contains("Red widgets are popular."));
}

#[tokio::test]
async fn generator_reports_empty_envelope() {
    let url = spawn_model_server(json!({ "choices": [] }), Duration::ZERO).await;
    let generator = ChatCompletionsGenerator::new(&generation_config(url, 10)).unwrap();
    assert!(matches!(
        generator.generate("hello").await,
        Err(GenerationError::EmptyResponse)
    ));
}

#[tokio::test]
async fn unreachable_model_server_is_502_not_a_hang() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/v1/chat/completions", addr);
    let generator = Arc::new(ChatCompletionsGenerator::new(&generation_config(url, 2)).unwrap());
    let app = app_with(Arc::new(InMemoryItemStore::new()), generator);
    seed_widget_and_gadget(&app).await;

    let started = Instant::now();
    let (status, body) =
        send_json(&app, Method::GET, "/generate_docx_from_query/?word=widget", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_unavailable");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn slow_model_server_times_out() {
    let url = spawn_model_server(
        json!({ "choices": [{ "message": { "content": "late" } }] }),
        Duration::from_secs(30),
    )
    .await;
    let generator = ChatCompletionsGenerator::new(&generation_config(url, 1)).unwrap();

    let started = Instant::now();
    let result = generator.generate("hello").await;
    assert!(matches!(result, Err(GenerationError::Transport(_))));
    assert!(started.elapsed() < Duration::from_secs(10));
}
