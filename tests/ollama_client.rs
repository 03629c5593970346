//! Ollama client against an in-process HTTP responder

mod support;

use biotools_annotate::llm::{
    GenerateRequest, LlmError, OllamaClient, OllamaConfig, TextGenerator, TraceContext,
};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use support::{MockServer, Reply};
use tempfile::TempDir;

fn client(url: &str, dir: &Path, max_retries: u32) -> OllamaClient {
    OllamaClient::new(OllamaConfig {
        host: url.to_string(),
        max_retries,
        retry_backoff: Duration::from_millis(10),
        timeout: Duration::from_secs(5),
        llm_log: dir.join("logs").join("ollama.log"),
        llm_trace: dir.join("trace.jsonl"),
        ..OllamaConfig::default()
    })
}

async fn unused_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

#[tokio::test]
async fn test_streamed_fragments_are_joined() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::ndjson(&["Here you go: {\"bio\":", " 0.8}", " done"])]).await;

    let generation = client(&server.url, dir.path(), 0)
        .generate(GenerateRequest::new("score this"))
        .await
        .unwrap();

    let value: Value = serde_json::from_str(&generation.json_text).unwrap();
    assert_eq!(value, json!({"bio": 0.8}));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/generate");
    let body = requests[0].json();
    assert_eq!(body["model"], "llama3.2");
    assert_eq!(body["prompt"], "score this");
    assert_eq!(body["format"], "json");

    let log = std::fs::read_to_string(dir.path().join("logs").join("ollama.log")).unwrap();
    assert!(log.contains("score this"));
}

#[tokio::test]
async fn test_thinking_used_when_response_is_empty() {
    let dir = TempDir::new().unwrap();
    let body = [
        json!({"response": "", "thinking": "{\"answer\": ", "done": false}).to_string(),
        json!({"response": "", "thinking": "true}", "done": true}).to_string(),
    ]
    .join("\n");
    let server = MockServer::sequence(vec![Reply::text(200, body)]).await;

    let generation = client(&server.url, dir.path(), 0)
        .generate(GenerateRequest::new("p"))
        .await
        .unwrap();
    assert_eq!(generation.json_text, "{\"answer\": true}");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![
        Reply::text(500, "boom"),
        Reply::text(503, "busy"),
        Reply::ndjson(&["{\"ok\": 1}"]),
    ])
    .await;

    let generation = client(&server.url, dir.path(), 3)
        .generate(GenerateRequest::new("p"))
        .await
        .unwrap();
    assert_eq!(generation.json_text, "{\"ok\": 1}");
    assert_eq!(server.hits("/api/generate"), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::text(500, "boom")]).await;

    let err = client(&server.url, dir.path(), 2)
        .generate(GenerateRequest::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Connection { .. }));
    assert_eq!(server.hits("/api/generate"), 3);

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    assert_eq!(trace.lines().count(), 3);
    assert!(trace.contains("connection_error"));
}

#[tokio::test]
async fn test_trace_numbers_each_http_attempt() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::text(500, "boom")]).await;

    let request = GenerateRequest::new("p").with_trace_context(TraceContext::new(2, "repair"));
    client(&server.url, dir.path(), 2)
        .generate(request)
        .await
        .unwrap_err();

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    let records: Vec<Value> = trace.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    let numbering: Vec<(Value, Value)> = records
        .iter()
        .map(|r| (r["attempt"].clone(), r["http_attempt"].clone()))
        .collect();
    assert_eq!(
        numbering,
        [(json!(2), json!(1)), (json!(2), json!(2)), (json!(2), json!(3))]
    );
    assert!(records.iter().all(|r| r["prompt_kind"] == "repair"));
}

#[tokio::test]
async fn test_missing_json_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::ndjson(&["I cannot score this tool."])]).await;

    let err = client(&server.url, dir.path(), 3)
        .generate(GenerateRequest::new("p"))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Generation { .. }));
    assert!(err.trace().is_some());
    assert_eq!(server.hits("/api/generate"), 1);

    let trace = std::fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    assert!(trace.contains("generation_error"));
}

#[tokio::test]
async fn test_missing_model_reports_hint() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::json(404, json!({"error": "model 'llama3.2' not found"}))]).await;

    let err = client(&server.url, dir.path(), 0)
        .generate(GenerateRequest::new("p"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found in Ollama"));
}

#[tokio::test]
async fn test_ping_healthy() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::json(200, json!({"models": []}))]).await;

    let health = client(&server.url, dir.path(), 0).ping().await;
    assert!(health.healthy);
    assert_eq!(server.hits("/api/tags"), 1);
}

#[tokio::test]
async fn test_ping_unreachable() {
    let dir = TempDir::new().unwrap();
    let url = unused_port_url().await;

    let health = client(&url, dir.path(), 0).ping().await;
    assert!(!health.healthy);
    assert!(health.error.unwrap().contains("not available"));
}

#[tokio::test]
async fn test_ping_http_error() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::sequence(vec![Reply::text(500, "down")]).await;

    let health = client(&server.url, dir.path(), 0).ping().await;
    assert!(!health.healthy);
    assert!(health.error.unwrap().starts_with("Request failed"));
}
