use async_trait::async_trait;
use seecats::core::error::AppError;
use seecats::core::types::ErrorCategory;
use seecats::core::workflow_graph::builder::{ChoiceState, PassState, TaskState, WorkflowBuilder};
use seecats::core::workflow_graph::executor::{EngineSettings, WorkflowEngine};
use seecats::core::workflow_graph::operator::{ExecutionContext, Operator, OperatorRegistry};
use seecats::core::workflow_graph::schema::{Condition, WorkflowDefinition};
use seecats::core::workflow_graph::state::ExecutionStatus;
use seecats::core::workflow_graph::trace::StateOutcome;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Doubles `params.value`.
struct Double;

#[async_trait]
impl Operator for Double {
    fn name(&self) -> &'static str {
        "math:double"
    }

    fn validate_params(&self, params: &Value) -> Result<(), AppError> {
        if params.get("value").and_then(Value::as_i64).is_none() {
            return Err(AppError::new(
                ErrorCategory::MalformedInputError,
                "math:double requires an integer 'value'",
            )
            .with_code("SC-INPUT-003"));
        }
        Ok(())
    }

    async fn execute(&self, params: Value, _ctx: ExecutionContext) -> Result<Value, AppError> {
        let value = params["value"].as_i64().unwrap_or_default();
        Ok(json!(value * 2))
    }
}

/// Records every call it receives.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<(String, Value, Value)>>>,
}

#[async_trait]
impl Operator for Recorder {
    fn name(&self) -> &'static str {
        "test:record"
    }

    fn validate_params(&self, _params: &Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn execute(&self, params: Value, ctx: ExecutionContext) -> Result<Value, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((ctx.state_id, params.clone(), ctx.context));
        Ok(json!({"recorded": params}))
    }
}

fn engine(recorder: &Recorder) -> WorkflowEngine {
    let mut builder = OperatorRegistry::builder();
    builder.register(Double);
    builder.register(recorder.clone());
    WorkflowEngine::new(builder.build(), EngineSettings::default())
}

fn route_by_kind() -> Arc<WorkflowDefinition> {
    Arc::new(
        WorkflowBuilder::new("router")
            .state(
                PassState::new("extract")
                    .parameters(json!({"kind": {"$path": "$.event.kind"}}))
                    .next("route"),
            )
            .state(
                ChoiceState::new("route")
                    .when(Condition::string_equals("$.kind", "photo"), "photo")
                    .when(Condition::string_equals("$.kind", "video"), "video")
                    .otherwise("other"),
            )
            .state(TaskState::new("photo", "test:record").parameters(json!({"route": "photo"})))
            .state(TaskState::new("video", "test:record").parameters(json!({"route": "video"})))
            .state(TaskState::new("other", "test:record").parameters(json!({"route": "other"})))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn first_matching_rule_wins() {
    let recorder = Recorder::default();
    let execution = engine(&recorder)
        .execute(route_by_kind(), json!({"event": {"kind": "video"}}))
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    assert_eq!(execution.trace.state_ids(), vec!["extract", "route", "video"]);
    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, json!({"route": "video"}));
}

#[tokio::test]
async fn default_taken_when_no_rule_matches() {
    let recorder = Recorder::default();
    let execution = engine(&recorder)
        .execute(route_by_kind(), json!({"event": {"kind": "audio"}}))
        .await
        .unwrap();
    assert_eq!(execution.trace.state_ids(), vec!["extract", "route", "other"]);
}

#[tokio::test]
async fn non_string_value_never_equals() {
    let recorder = Recorder::default();
    let execution = engine(&recorder)
        .execute(route_by_kind(), json!({"event": {"kind": 7}}))
        .await
        .unwrap();
    assert_eq!(execution.trace.state_ids().last().copied(), Some("other"));
}

#[tokio::test]
async fn task_output_lands_at_result_path() {
    let recorder = Recorder::default();
    let definition = WorkflowBuilder::new("double")
        .state(
            TaskState::new("double", "math:double")
                .parameters(json!({"value": {"$path": "$.n"}}))
                .result_path("$.result.doubled")
                .next("report"),
        )
        .state(
            TaskState::new("report", "test:record")
                .parameters(json!({"value": {"$path": "$.result.doubled"}})),
        )
        .build()
        .unwrap();

    let execution = engine(&recorder)
        .execute(Arc::new(definition), json!({"n": 21}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    assert_eq!(execution.context["result"]["doubled"], json!(42));
    assert_eq!(execution.context["n"], json!(21));
    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls[0].1, json!({"value": 42}));
}

#[tokio::test]
async fn task_without_result_path_leaves_context_untouched() {
    let recorder = Recorder::default();
    let definition = WorkflowBuilder::new("discard")
        .state(TaskState::new("record", "test:record").parameters(json!({"x": 1})))
        .build()
        .unwrap();
    let execution = engine(&recorder)
        .execute(Arc::new(definition), json!({"keep": true}))
        .await
        .unwrap();
    assert_eq!(execution.context, json!({"keep": true}));
}

#[tokio::test]
async fn operator_sees_context_as_of_state_entry() {
    let recorder = Recorder::default();
    let definition = WorkflowBuilder::new("snapshot")
        .state(
            PassState::new("set")
                .parameters(json!({"stage": "ready"}))
                .next("record"),
        )
        .state(TaskState::new("record", "test:record"))
        .build()
        .unwrap();
    let execution = engine(&recorder)
        .execute(Arc::new(definition), json!({"stage": "new"}))
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Succeeded);
    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls[0].0, "record");
    assert_eq!(calls[0].2, json!({"stage": "ready"}));
}

#[tokio::test]
async fn expression_conditions_and_templates() {
    let recorder = Recorder::default();
    let definition = WorkflowBuilder::new("expr")
        .state(
            ChoiceState::new("gate")
                .when(Condition::expr("context.count > 2"), "many")
                .otherwise("few"),
        )
        .state(
            TaskState::new("many", "test:record")
                .parameters(json!({"total": {"$expr": "context.count * 10"}})),
        )
        .state(TaskState::new("few", "test:record"))
        .build()
        .unwrap();
    let engine = engine(&recorder);

    let execution = engine
        .execute(Arc::new(definition.clone()), json!({"count": 3}))
        .await
        .unwrap();
    assert_eq!(execution.trace.state_ids(), vec!["gate", "many"]);
    assert_eq!(recorder.calls.lock().unwrap()[0].1, json!({"total": 30}));

    let execution = engine
        .execute(Arc::new(definition), json!({"count": 1}))
        .await
        .unwrap();
    assert_eq!(execution.trace.state_ids(), vec!["gate", "few"]);
}

#[tokio::test]
async fn negated_presence_check() {
    let recorder = Recorder::default();
    let definition = Arc::new(
        WorkflowBuilder::new("not")
            .state(
                ChoiceState::new("gate")
                    .when(
                        Condition::negate(Condition::is_present("$.skip")),
                        "run",
                    )
                    .otherwise("skipped"),
            )
            .state(TaskState::new("run", "test:record"))
            .state(PassState::new("skipped"))
            .build()
            .unwrap(),
    );
    let engine = engine(&recorder);

    let ran = engine.execute(definition.clone(), json!({})).await.unwrap();
    assert_eq!(ran.trace.state_ids(), vec!["gate", "run"]);

    let skipped = engine
        .execute(definition, json!({"skip": true}))
        .await
        .unwrap();
    assert_eq!(skipped.trace.state_ids(), vec!["gate", "skipped"]);
}

#[tokio::test]
async fn rejected_params_fail_the_state() {
    let recorder = Recorder::default();
    let definition = WorkflowBuilder::new("bad-params")
        .state(
            TaskState::new("double", "math:double")
                .parameters(json!({"value": "not a number"}))
                .next("after"),
        )
        .state(TaskState::new("after", "test:record"))
        .build()
        .unwrap();
    let execution = engine(&recorder)
        .execute(Arc::new(definition), json!({}))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    let error = execution.error.as_ref().unwrap();
    assert_eq!(error.code, "SC-INPUT-003");
    assert_eq!(error.state_id.as_deref(), Some("double"));
    assert!(!execution.trace.was_entered("after"));
    assert!(recorder.calls.lock().unwrap().is_empty());
    match execution.trace.entry("double").unwrap().outcome {
        Some(StateOutcome::Failed { code, .. }) => assert_eq!(code, "SC-INPUT-003"),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn input_is_preserved_verbatim() {
    let recorder = Recorder::default();
    let trigger = json!({"event": {"kind": "photo"}, "extra": [1, 2, 3]});
    let execution = engine(&recorder)
        .execute(route_by_kind(), trigger.clone())
        .await
        .unwrap();
    assert_eq!(execution.input, trigger);
    assert_eq!(execution.context["kind"], json!("photo"));
    assert!(execution.completed_at.is_some());
}
