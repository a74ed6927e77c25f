use seecats::core::types::ErrorCategory;
use seecats::core::workflow_graph::capability::{
    ArtifactCapability, ArtifactRequest, Capabilities, CapabilityError, ClassificationCapability,
    ClassificationRequest, Label, NotificationCapability, NotificationRequest,
};
use seecats::core::workflow_graph::executor::{EngineSettings, WorkflowEngine};
use seecats::core::workflow_graph::operator::OperatorRegistry;
use seecats::core::workflow_graph::operators::capability_registry;
use seecats::core::workflow_graph::operators::retry::RetryPolicy;
use seecats::core::workflow_graph::schema::{self, StateKind, WorkflowDefinition};
use seecats::core::workflow_graph::validate::validate_grants;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CLASSIFY_WORKFLOW: &str = r#"
name: classify-and-act
comment: yaml rendition of the image pipeline
start_at: Transform Input
timeout_seconds: 120
states:
  - id: Transform Input
    type: pass
    parameters:
      image:
        $path: "$.detail.object.key"
    next: DetectLabels
  - id: DetectLabels
    type: task
    resource: classification:detectLabels
    parameters:
      container: seecats-inputs
      key:
        $path: "$.image"
      label_filter: [Cat]
    result_path: "$.classificationResult"
    next: Has results?
  - id: Has results?
    type: choice
    choices:
      - condition:
          op: is_present
          path: "$.classificationResult[0]"
        next: Check Cats
    default: Send no cat notification
  - id: Check Cats
    type: choice
    choices:
      - condition:
          op: string_equals
          path: "$.classificationResult[0].name"
          value: Cat
        next: Parallel
    default: Send no cat notification
  - id: Parallel
    type: parallel
    branches:
      - start_at: Send cat notification
        states:
          - id: Send cat notification
            type: task
            resource: notification:publish
            parameters: {topic: seecats-notifications, message: "Cat!"}
      - start_at: Invoke Generate Collage
        states:
          - id: Invoke Generate Collage
            type: task
            resource: artifact:generate
            parameters: {source_container: seecats-inputs, destination_container: seecats-output}
  - id: Send no cat notification
    type: task
    resource: notification:publish
    parameters: {topic: seecats-notifications, message: "No cat!"}
"#;

const TWO_STATE_CYCLE: &str = r#"
name: cycle
start_at: a
states:
  - id: a
    type: pass
    next: b
  - id: b
    type: choice
    choices:
      - condition: {op: is_present, path: "$.done"}
        next: end
    default: a
  - id: end
    type: pass
"#;

const SELF_LOOP: &str = r#"
name: self-loop
start_at: a
states:
  - id: a
    type: choice
    choices:
      - condition: {op: expr, expr: "context.retry == true"}
        next: a
    default: end
  - id: end
    type: pass
"#;

const SECOND_ENTRY: &str = r#"
name: orphan
start_at: a
states:
  - id: a
    type: pass
    next: end
  - id: orphan
    type: pass
    next: end
  - id: end
    type: pass
"#;

const BRANCH_ESCAPE: &str = r#"
name: escape
start_at: fan
states:
  - id: fan
    type: parallel
    branches:
      - start_at: inner
        states:
          - id: inner
            type: pass
            next: after
    next: after
  - id: after
    type: pass
"#;

fn write_workflow(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", yaml).unwrap();
    file
}

fn parse_err(yaml: &str) -> seecats::core::error::AppError {
    WorkflowDefinition::from_yaml(yaml).expect_err("definition must be rejected")
}

struct Unreachable;

#[async_trait::async_trait]
impl ClassificationCapability for Unreachable {
    async fn detect_labels(&self, _: ClassificationRequest) -> Result<Vec<Label>, CapabilityError> {
        Err(CapabilityError::Rejected("not used".into()))
    }
}

#[async_trait::async_trait]
impl NotificationCapability for Unreachable {
    async fn publish(&self, _: NotificationRequest) -> Result<(), CapabilityError> {
        Err(CapabilityError::Rejected("not used".into()))
    }
}

#[async_trait::async_trait]
impl ArtifactCapability for Unreachable {
    async fn generate(&self, _: ArtifactRequest) -> Result<(), CapabilityError> {
        Err(CapabilityError::Rejected("not used".into()))
    }
}

fn granted() -> OperatorRegistry {
    let shared = Arc::new(Unreachable);
    let capabilities = Capabilities {
        classification: shared.clone(),
        notification: shared.clone(),
        artifact: shared,
    };
    capability_registry(&capabilities, RetryPolicy::default())
}

#[test]
fn loads_pipeline_yaml_from_file() {
    let file = write_workflow(CLASSIFY_WORKFLOW);
    let definition = schema::load_definition(file.path()).expect("valid workflow");
    assert_eq!(definition.name, "classify-and-act");
    assert_eq!(definition.timeout_seconds, Some(120));
    assert_eq!(definition.all_states().len(), 8);
    match &definition.find_state("DetectLabels").unwrap().kind {
        StateKind::Task {
            resource,
            parameters,
            result_path,
            ..
        } => {
            assert_eq!(resource, "classification:detectLabels");
            assert_eq!(parameters["label_filter"], json!(["Cat"]));
            assert_eq!(result_path.as_deref(), Some("$.classificationResult"));
        }
        other => panic!("unexpected kind {:?}", other),
    }
    validate_grants(&definition, &granted()).expect("all resources granted");
}

#[test]
fn yaml_round_trip_preserves_definition() {
    let definition = WorkflowDefinition::from_yaml(CLASSIFY_WORKFLOW).unwrap();
    let reparsed = WorkflowDefinition::from_yaml(&definition.to_yaml().unwrap()).unwrap();
    assert_eq!(definition, reparsed);
    assert_eq!(
        definition.definition_hash().unwrap(),
        reparsed.definition_hash().unwrap()
    );
}

#[test]
fn missing_file_is_io_error() {
    let err = schema::load_definition(std::path::Path::new("/nonexistent/workflow.yaml"))
        .expect_err("missing file");
    assert_eq!(err.category, ErrorCategory::IoError);
}

#[test]
fn rejects_two_state_cycle() {
    let err = parse_err(TWO_STATE_CYCLE);
    assert_eq!(err.category, ErrorCategory::DefinitionError);
    assert_eq!(err.code, "SC-DEF-002");
    assert!(err.message.contains("a, b"), "{}", err.message);
}

#[test]
fn rejects_self_loop() {
    let err = parse_err(SELF_LOOP);
    assert_eq!(err.code, "SC-DEF-002");
}

#[test]
fn rejects_second_entry_state() {
    let err = parse_err(SECOND_ENTRY);
    assert_eq!(err.code, "SC-DEF-001");
    assert!(err.message.contains("orphan"));
}

#[test]
fn rejects_successor_outside_branch() {
    let err = parse_err(BRANCH_ESCAPE);
    assert_eq!(err.code, "SC-DEF-001");
    assert!(err.message.contains("after"));
}

#[test]
fn rejects_duplicate_ids_across_scopes() {
    let yaml = r#"
name: dup
start_at: fan
states:
  - id: fan
    type: parallel
    branches:
      - start_at: fan
        states:
          - id: fan
            type: pass
"#;
    let err = parse_err(yaml);
    assert_eq!(err.code, "SC-DEF-001");
    assert!(err.message.contains("duplicate state id"));
}

#[test]
fn rejects_unknown_start_state() {
    let yaml = r#"
name: bad-start
start_at: nowhere
states:
  - id: a
    type: pass
"#;
    assert_eq!(parse_err(yaml).code, "SC-DEF-001");
}

#[test]
fn rejects_parallel_without_branches() {
    let yaml = r#"
name: empty-fan
start_at: fan
states:
  - id: fan
    type: parallel
    branches: []
"#;
    let err = parse_err(yaml);
    assert!(err.message.contains("at least one branch"));
}

#[test]
fn rejects_choice_without_rules() {
    let yaml = r#"
name: empty-choice
start_at: c
states:
  - id: c
    type: choice
    choices: []
    default: end
  - id: end
    type: pass
"#;
    assert!(parse_err(yaml).message.contains("at least one rule"));
}

#[test]
fn rejects_invalid_reference_path() {
    let yaml = r#"
name: bad-path
start_at: a
states:
  - id: a
    type: pass
    parameters:
      image:
        $path: "detail..key"
"#;
    let err = parse_err(yaml);
    assert_eq!(err.category, ErrorCategory::DefinitionError);
    assert_eq!(err.code, "SC-DEF-004");
}

#[test]
fn rejects_expression_that_does_not_compile() {
    let yaml = r#"
name: bad-expr
start_at: c
states:
  - id: c
    type: choice
    choices:
      - condition: {op: expr, expr: "context.labels.len( >"}
        next: end
    default: end
  - id: end
    type: pass
"#;
    assert_eq!(parse_err(yaml).code, "SC-DEF-004");
}

#[test]
fn rejects_unparseable_yaml() {
    let err = parse_err("name: [unterminated");
    assert_eq!(err.category, ErrorCategory::DefinitionError);
    assert!(err.message.starts_with("failed to parse workflow definition"));
}

#[test]
fn ungranted_resource_is_rejected() {
    let yaml = r#"
name: ungranted
start_at: t
states:
  - id: t
    type: task
    resource: storage:deleteEverything
"#;
    let definition = WorkflowDefinition::from_yaml(yaml).unwrap();
    let err = validate_grants(&definition, &granted()).unwrap_err();
    assert_eq!(err.code, "SC-DEF-003");
    assert!(err.message.contains("storage:deleteEverything"));
}

#[tokio::test]
async fn engine_rejects_invalid_definition_before_creating_execution() {
    // Bypass from_yaml so the engine sees the unvalidated graph.
    let definition: WorkflowDefinition = serde_yaml::from_str(TWO_STATE_CYCLE).unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let store = seecats::core::workflow_graph::store::ExecutionStore::new(tmp.path());
    let engine = WorkflowEngine::new(
        granted(),
        EngineSettings {
            store: Some(store.clone()),
            ..EngineSettings::default()
        },
    );
    let err = engine
        .start(Arc::new(definition), json!({}))
        .err()
        .expect("rejected");
    assert_eq!(err.category, ErrorCategory::DefinitionError);
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn engine_rejects_ungranted_capability() {
    let yaml = r#"
name: ungranted
start_at: t
states:
  - id: t
    type: task
    resource: classification:detectLabels
"#;
    let definition = Arc::new(WorkflowDefinition::from_yaml(yaml).unwrap());
    let engine = WorkflowEngine::new(OperatorRegistry::new(), EngineSettings::default());
    let err = engine.start(definition, json!({})).err().expect("rejected");
    assert_eq!(err.code, "SC-DEF-003");
}
