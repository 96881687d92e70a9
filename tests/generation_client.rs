//! Integration tests for the probe-then-generate client.
//!
//! Each test spins up an Axum stub of the `generateContent` endpoint on a
//! random port and points a real `GeminiClient` at it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use plan_intake::config::GenerationConfig;
use plan_intake::error::GenerationError;
use plan_intake::generation::{GeminiClient, GenerationStage, ProgressSink, TextGenerator};

const PROBE_TEXT: &str = "test connection";

/// Canned answer of the stub endpoint.
#[derive(Clone)]
struct Reply {
    status: u16,
    body: String,
    delay: Duration,
}

impl Reply {
    fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn text(text: &str) -> Self {
        Self::json(json!({
            "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]
        }))
    }

    fn status(status: u16) -> Self {
        Self {
            status,
            body: json!({"error": {"code": status, "message": "stub failure"}}).to_string(),
            delay: Duration::ZERO,
        }
    }

    fn raw(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A request seen by the stub: the prompt text and the `key` parameter.
#[derive(Debug, Clone)]
struct Seen {
    text: String,
    key: Option<String>,
}

struct Stub {
    probe: Reply,
    generate: Reply,
    seen: Mutex<Vec<Seen>>,
}

impl Stub {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

async fn handle(
    State(stub): State<Arc<Stub>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let text = parsed["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    stub.seen.lock().unwrap().push(Seen {
        text: text.clone(),
        key: query.get("key").cloned(),
    });

    let reply = if text == PROBE_TEXT {
        stub.probe.clone()
    } else {
        stub.generate.clone()
    };
    tokio::time::sleep(reply.delay).await;
    (StatusCode::from_u16(reply.status).unwrap(), reply.body)
}

/// Start the stub on a random port and return a config pointing at it.
async fn start_server(probe: Reply, generate: Reply) -> (GenerationConfig, Arc<Stub>) {
    let stub = Arc::new(Stub {
        probe,
        generate,
        seen: Mutex::new(Vec::new()),
    });
    let app = Router::new().fallback(handle).with_state(Arc::clone(&stub));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = GenerationConfig::new(secrecy::SecretString::from("test-key"))
        .with_base_url(format!("http://127.0.0.1:{port}/v1beta"))
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(300));
    (config, stub)
}

async fn start_stub(probe: Reply, generate: Reply) -> (GeminiClient, Arc<Stub>) {
    let (config, stub) = start_server(probe, generate).await;
    (GeminiClient::new(config), stub)
}

/// Progress sink that keeps every stage.
#[derive(Default)]
struct Stages(Vec<GenerationStage>);

#[async_trait]
impl ProgressSink for Stages {
    async fn report(&mut self, stage: GenerationStage) {
        self.0.push(stage);
    }
}

#[tokio::test]
async fn successful_generation_probes_first() {
    let (client, stub) = start_stub(
        Reply::json(json!({"candidates": []})),
        Reply::text("A | B | C\n---\nD | E | F"),
    )
    .await;
    let mut stages = Stages::default();

    let text = client
        .generate("Снижение тревожности", &mut stages)
        .await
        .unwrap();

    assert_eq!(text, "A | B | C\n---\nD | E | F");
    assert_eq!(
        stages.0,
        vec![
            GenerationStage::Connecting,
            GenerationStage::Generating,
            GenerationStage::Succeeded
        ]
    );

    let seen = stub.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].text, PROBE_TEXT);
    assert!(seen[1].text.contains("Снижение тревожности"));
    assert!(seen.iter().all(|s| s.key.as_deref() == Some("test-key")));
}

#[tokio::test]
async fn probe_error_status_skips_generation() {
    let (client, stub) = start_stub(Reply::status(403), Reply::text("unused")).await;
    let mut stages = Stages::default();

    let err = client.generate("цель", &mut stages).await.unwrap_err();

    assert!(err.is_connectivity());
    assert!(err.to_string().contains("403"));
    assert_eq!(stub.seen().len(), 1);
    assert_eq!(stages.0.len(), 2);
    assert!(matches!(stages.0[1], GenerationStage::ConnectivityFailed(_)));
}

#[tokio::test]
async fn probe_timeout_is_connectivity_failure() {
    let (client, stub) = start_stub(
        Reply::json(json!({})).delayed(Duration::from_secs(2)),
        Reply::text("unused"),
    )
    .await;
    let mut stages = Stages::default();

    let err = client.generate("цель", &mut stages).await.unwrap_err();

    assert!(matches!(err, GenerationError::Connectivity(ref d) if d.contains("timed out")));
    assert_eq!(stub.seen().len(), 1);
    assert!(!stages.0.contains(&GenerationStage::Generating));
}

#[tokio::test]
async fn probe_malformed_body_is_connectivity_failure() {
    let (client, _stub) = start_stub(Reply::raw("<html>proxy</html>"), Reply::text("x")).await;
    let err = client.probe().await.unwrap_err();
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn generation_error_status() {
    let (client, stub) = start_stub(Reply::json(json!({})), Reply::status(503)).await;
    let mut stages = Stages::default();

    let err = client.generate("цель", &mut stages).await.unwrap_err();

    assert!(matches!(err, GenerationError::Request(ref d) if d.contains("503")));
    assert_eq!(stub.seen().len(), 2);
    assert!(matches!(
        stages.0.last(),
        Some(GenerationStage::GenerationFailed(_))
    ));
}

#[tokio::test]
async fn generation_timeout() {
    let (client, _stub) = start_stub(
        Reply::json(json!({})),
        Reply::text("late").delayed(Duration::from_secs(2)),
    )
    .await;
    let err = client.generate("цель", &mut Stages::default()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Request(ref d) if d.contains("timed out")));
}

#[tokio::test]
async fn empty_candidates_is_invalid_format() {
    let (client, _stub) = start_stub(
        Reply::json(json!({})),
        Reply::json(json!({"candidates": []})),
    )
    .await;
    let mut stages = Stages::default();

    let err = client.generate("цель", &mut stages).await.unwrap_err();

    assert_eq!(err, GenerationError::InvalidFormat);
    assert_eq!(
        stages.0.last(),
        Some(&GenerationStage::GenerationFailed(
            "Неверный формат ответа от API".to_string()
        ))
    );
}

#[tokio::test]
async fn missing_text_is_invalid_format() {
    let (client, _stub) = start_stub(
        Reply::json(json!({})),
        Reply::json(json!({"candidates": [{"finishReason": "SAFETY"}]})),
    )
    .await;
    let err = client.generate("цель", &mut Stages::default()).await.unwrap_err();
    assert_eq!(err, GenerationError::InvalidFormat);
}

#[tokio::test]
async fn non_json_generation_body_is_request_failure() {
    let (client, _stub) = start_stub(Reply::json(json!({})), Reply::raw("not json")).await;
    let err = client.generate("цель", &mut Stages::default()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Request(ref d) if d.contains("invalid JSON")));
}

#[tokio::test]
async fn connect_fails_when_endpoint_rejects_probe() {
    let (config, stub) = start_server(Reply::status(401), Reply::text("unused")).await;

    let err = GeminiClient::connect(config).await.unwrap_err();

    assert!(matches!(err, GenerationError::Connectivity(ref d) if d.contains("401")));
    assert_eq!(stub.seen().len(), 1);
    assert_eq!(stub.seen()[0].text, PROBE_TEXT);
}

#[tokio::test]
async fn connect_fails_when_nothing_listens() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let config = GenerationConfig::new(secrecy::SecretString::from("secret-key"))
        .with_base_url(format!("http://127.0.0.1:{port}/v1beta"));

    let err = GeminiClient::connect(config).await.unwrap_err();

    assert!(err.is_connectivity());
    assert!(!err.to_string().contains("secret-key"));
}

#[tokio::test]
async fn connect_returns_working_client() {
    let (config, stub) = start_server(Reply::json(json!({})), Reply::text("A | B | C")).await;

    let client = GeminiClient::connect(config).await.unwrap();
    let text = client.generate("цель", &mut Stages::default()).await.unwrap();

    assert_eq!(text, "A | B | C");
    assert_eq!(stub.seen().len(), 3);
}
