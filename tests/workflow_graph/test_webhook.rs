use reqwest::StatusCode;
use seecats::core::workflow_graph::builder::{PassState, WorkflowBuilder};
use seecats::core::workflow_graph::executor::{EngineSettings, WorkflowEngine};
use seecats::core::workflow_graph::operator::OperatorRegistry;
use seecats::core::workflow_graph::store::ExecutionStore;
use seecats::core::workflow_graph::trigger::{EventRule, TriggerRouter};
use seecats::core::workflow_graph::webhook::{serve_webhook_with_ready_notifier, WebhookSettings};
use serde_json::{json, Value};
use serial_test::serial;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const TOKEN_ENV: &str = "SEECATS_TEST_WEBHOOK_TOKEN";
const TOKEN: &str = "s3cret-token";

struct Server {
    addr: SocketAddr,
    task: JoinHandle<()>,
    _state: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Server {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn start_server(max_body_bytes: usize) -> Server {
    std::env::set_var(TOKEN_ENV, TOKEN);
    let state = TempDir::new().unwrap();
    let engine = WorkflowEngine::new(
        OperatorRegistry::new(),
        EngineSettings {
            store: Some(ExecutionStore::new(state.path())),
            ..EngineSettings::default()
        },
    );
    let definition = WorkflowBuilder::new("intake")
        .state(PassState::new("extract").parameters(json!({"image": {"$path": "$.detail.object.key"}})))
        .build()
        .unwrap();
    let router = TriggerRouter::new(
        engine,
        Arc::new(definition),
        EventRule::for_container("seecats-inputs"),
    );
    let settings = WebhookSettings {
        bind: "127.0.0.1:0".to_string(),
        auth_token_env: TOKEN_ENV.to_string(),
        max_body_bytes,
    };

    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        serve_webhook_with_ready_notifier(router, settings, tx)
            .await
            .expect("webhook server");
    });
    let addr = rx.await.expect("server ready");
    Server {
        addr,
        task,
        _state: state,
    }
}

fn upload(bucket: &str) -> Value {
    json!({
        "source": "aws.s3",
        "detail-type": "Object Created",
        "detail": {
            "bucket": {"name": bucket},
            "object": {"key": "photo1.jpg"}
        }
    })
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
#[serial]
async fn missing_token_is_rejected() {
    let server = start_server(1024 * 1024).await;
    let response = reqwest::Client::new()
        .post(server.url("/v1/events"))
        .json(&upload("seecats-inputs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "SC-WEBHOOK-401");
}

#[tokio::test]
#[serial]
async fn wrong_token_is_rejected() {
    let server = start_server(1024 * 1024).await;
    let response = reqwest::Client::new()
        .post(server.url("/v1/events"))
        .bearer_auth("guess")
        .json(&upload("seecats-inputs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn invalid_json_is_bad_request() {
    let server = start_server(1024 * 1024).await;
    let response = reqwest::Client::new()
        .post(server.url("/v1/events"))
        .bearer_auth(TOKEN)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "SC-WEBHOOK-400");
}

#[tokio::test]
#[serial]
async fn non_matching_event_is_ignored() {
    let server = start_server(1024 * 1024).await;
    let response = reqwest::Client::new()
        .post(server.url("/v1/events"))
        .bearer_auth(TOKEN)
        .json(&upload("other-bucket"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ignored"}));
}

#[tokio::test]
#[serial]
async fn matching_event_starts_execution_that_can_be_fetched() {
    let server = start_server(1024 * 1024).await;
    let client = reqwest::Client::new();
    let response = client
        .post(server.url("/v1/events"))
        .bearer_auth(TOKEN)
        .json(&upload("seecats-inputs"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], json!("running"));
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let mut record = Value::Null;
    for _ in 0..50 {
        let response = client
            .get(server.url(&format!("/v1/executions/{}", execution_id)))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        record = response.json().await.unwrap();
        if record["status"] != json!("Running") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(record["status"], json!("Succeeded"));
    assert_eq!(record["context"]["image"], json!("photo1.jpg"));
    assert_eq!(record["input"], upload("seecats-inputs"));
}

#[tokio::test]
#[serial]
async fn unknown_execution_is_not_found() {
    let server = start_server(1024 * 1024).await;
    let client = reqwest::Client::new();
    let response = client
        .get(server.url(&format!("/v1/executions/{}", uuid::Uuid::new_v4())))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "SC-WEBHOOK-404");

    let response = client
        .get(server.url("/v1/executions/not-a-uuid"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
async fn oversized_payload_is_rejected() {
    let server = start_server(256).await;
    let mut event = upload("seecats-inputs");
    event["padding"] = json!("x".repeat(1024));
    let response = reqwest::Client::new()
        .post(server.url("/v1/events"))
        .bearer_auth(TOKEN)
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(response).await, "SC-WEBHOOK-413");
}

#[tokio::test]
#[serial]
async fn missing_token_variable_fails_startup() {
    std::env::remove_var("SEECATS_TEST_UNSET_TOKEN");
    let engine = WorkflowEngine::new(OperatorRegistry::new(), EngineSettings::default());
    let definition = WorkflowBuilder::new("intake")
        .state(PassState::new("only"))
        .build()
        .unwrap();
    let router = TriggerRouter::new(engine, Arc::new(definition), EventRule::default());
    let (tx, _rx) = oneshot::channel();
    let err = serve_webhook_with_ready_notifier(
        router,
        WebhookSettings {
            bind: "127.0.0.1:0".to_string(),
            auth_token_env: "SEECATS_TEST_UNSET_TOKEN".to_string(),
            max_body_bytes: 1024,
        },
        tx,
    )
    .await
    .unwrap_err();
    assert!(err.message.contains("SEECATS_TEST_UNSET_TOKEN"));
}
