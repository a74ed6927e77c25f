use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use seecats::core::error::AppError;
use seecats::core::types::ErrorCategory;
use seecats::core::workflow_graph::builder::{TaskState, WorkflowBuilder};
use seecats::core::workflow_graph::executor::{EngineSettings, WorkflowEngine};
use seecats::core::workflow_graph::operator::{ExecutionContext, Operator, OperatorRegistry};
use seecats::core::workflow_graph::state::{ExecutionStatus, WorkflowExecution};
use seecats::core::workflow_graph::store::{ExecutionPaths, ExecutionStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

struct Slow;

#[async_trait]
impl Operator for Slow {
    fn name(&self) -> &'static str {
        "test:slow"
    }

    fn validate_params(&self, _params: &Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn execute(&self, _params: Value, _ctx: ExecutionContext) -> Result<Value, AppError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(json!({"ok": true}))
    }
}

fn record(name: &str, started_offset_secs: i64) -> WorkflowExecution {
    let started_at = Utc::now() + ChronoDuration::seconds(started_offset_secs);
    WorkflowExecution::new(
        Uuid::new_v4(),
        name,
        "hash",
        json!({"detail": {"object": {"key": "a.jpg"}}}),
        started_at,
        started_at + ChronoDuration::seconds(300),
    )
}

fn store() -> (TempDir, ExecutionStore) {
    let tmp = TempDir::new().unwrap();
    let store = ExecutionStore::new(tmp.path());
    (tmp, store)
}

#[test]
fn save_and_load_round_trip() {
    let (_tmp, store) = store();
    let execution = record("seecats", 0);
    store.save(&execution).unwrap();

    let paths = ExecutionPaths::new(store.state_dir(), &execution.execution_id);
    assert!(paths.execution_file.exists());
    assert!(!paths.execution_file.with_extension("tmp").exists());
    assert_eq!(store.load(&execution.execution_id).unwrap(), execution);
}

#[test]
fn unknown_execution_is_store_error() {
    let (_tmp, store) = store();
    let err = store.load(&Uuid::new_v4()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::IoError);
    assert_eq!(err.code, "SC-STORE-001");
}

#[test]
fn corrupt_record_is_serialization_error() {
    let (_tmp, store) = store();
    let id = Uuid::new_v4();
    let paths = ExecutionPaths::new(store.state_dir(), &id);
    std::fs::create_dir_all(&paths.execution_dir).unwrap();
    std::fs::write(&paths.execution_file, b"{not json").unwrap();
    let err = store.load(&id).unwrap_err();
    assert_eq!(err.category, ErrorCategory::SerializationError);
}

#[test]
fn list_is_newest_first_and_skips_junk() {
    let (tmp, store) = store();
    assert!(store.list().unwrap().is_empty());

    let older = record("older", -60);
    let newer = record("newer", 0);
    store.save(&older).unwrap();
    store.save(&newer).unwrap();
    std::fs::create_dir_all(tmp.path().join("executions").join("not-a-uuid")).unwrap();
    std::fs::create_dir_all(
        tmp.path()
            .join("executions")
            .join(Uuid::new_v4().to_string()),
    )
    .unwrap();

    let names: Vec<String> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|summary| summary.definition_name)
        .collect();
    assert_eq!(names, vec!["newer", "older"]);
}

#[test]
fn save_overwrites_previous_record() {
    let (_tmp, store) = store();
    let mut execution = record("seecats", 0);
    store.save(&execution).unwrap();
    execution.status = ExecutionStatus::Succeeded;
    store.save(&execution).unwrap();
    assert_eq!(
        store.load(&execution.execution_id).unwrap().status,
        ExecutionStatus::Succeeded
    );
    assert_eq!(store.list().unwrap().len(), 1);
}

#[tokio::test]
async fn engine_persists_at_start_and_at_finish() {
    let (_tmp, store) = store();
    let mut builder = OperatorRegistry::builder();
    builder.register(Slow);
    let engine = WorkflowEngine::new(
        builder.build(),
        EngineSettings {
            store: Some(store.clone()),
            ..EngineSettings::default()
        },
    );
    let definition = Arc::new(
        WorkflowBuilder::new("persisted")
            .state(TaskState::new("slow", "test:slow").result_path("$.slow"))
            .build()
            .unwrap(),
    );

    let handle = engine
        .start(definition.clone(), json!({"n": 1}))
        .unwrap();
    let running = store.load(&handle.execution_id).unwrap();
    assert_eq!(running.status, ExecutionStatus::Running);
    assert_eq!(running.definition_name, "persisted");
    assert_eq!(running.definition_hash, definition.definition_hash().unwrap());
    assert!(running.completed_at.is_none());

    let finished = handle.wait().await.unwrap();
    let stored = store.load(&finished.execution_id).unwrap();
    assert_eq!(stored, finished);
    assert_eq!(stored.status, ExecutionStatus::Succeeded);
    assert_eq!(stored.context["slow"], json!({"ok": true}));
    assert_eq!(stored.trace.state_ids(), vec!["slow"]);
}
