use seecats::core::types::ErrorCategory;
use seecats::core::workflow_graph::builder::{
    BranchBuilder, ChoiceState, ParallelState, PassState, TaskState, WorkflowBuilder,
};
use seecats::core::workflow_graph::dot::definition_to_dot;
use seecats::core::workflow_graph::pipeline::{
    build_definition, PipelineSettings, CHECK_TARGET, FAN_OUT, HAS_RESULTS, SEND_NO_MATCH,
};
use seecats::core::workflow_graph::schema::{Condition, StateKind, WorkflowDefinition};
use serde_json::json;

#[test]
fn builder_output_matches_equivalent_yaml() {
    let built = WorkflowBuilder::new("greeter")
        .timeout_seconds(30)
        .state(
            PassState::new("extract")
                .parameters(json!({"who": {"$path": "$.detail.user"}}))
                .next("decide"),
        )
        .state(
            ChoiceState::new("decide")
                .when(Condition::string_equals("$.who", "admin"), "notify")
                .otherwise("done"),
        )
        .state(
            TaskState::new("notify", "notification:publish")
                .parameters(json!({"topic": "ops", "message": "admin seen"}))
                .next("done"),
        )
        .state(PassState::new("done"))
        .build()
        .unwrap();

    let parsed = WorkflowDefinition::from_yaml(
        r#"
name: greeter
start_at: extract
timeout_seconds: 30
states:
  - id: extract
    type: pass
    parameters:
      who: {$path: "$.detail.user"}
    next: decide
  - id: decide
    type: choice
    choices:
      - condition: {op: string_equals, path: "$.who", value: admin}
        next: notify
    default: done
  - id: notify
    type: task
    resource: notification:publish
    parameters: {topic: ops, message: admin seen}
    next: done
  - id: done
    type: pass
"#,
    )
    .unwrap();

    assert_eq!(built, parsed);
}

#[test]
fn explicit_start_overrides_first_state() {
    let definition = WorkflowBuilder::new("reordered")
        .start_at("first")
        .state(PassState::new("second"))
        .state(PassState::new("first").next("second"))
        .build()
        .unwrap();
    assert_eq!(definition.start_at, "first");
}

#[test]
fn branch_builder_collects_multi_state_branches() {
    let definition = WorkflowBuilder::new("fan")
        .state(
            ParallelState::new("fan")
                .branch(
                    BranchBuilder::new()
                        .state(PassState::new("a1").next("a2"))
                        .state(PassState::new("a2")),
                )
                .branch(BranchBuilder::new().state(PassState::new("b1")))
                .result_path("$.branches")
                .next("join"),
        )
        .state(PassState::new("join"))
        .build()
        .unwrap();

    match &definition.states[0].kind {
        StateKind::Parallel {
            branches,
            result_path,
            next,
        } => {
            assert_eq!(branches.len(), 2);
            assert_eq!(branches[0].start_at, "a1");
            assert_eq!(branches[0].states.len(), 2);
            assert_eq!(result_path.as_deref(), Some("$.branches"));
            assert_eq!(next.as_deref(), Some("join"));
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert_eq!(definition.all_states().len(), 5);
}

#[test]
fn build_rejects_cycles() {
    let err = WorkflowBuilder::new("loop")
        .state(PassState::new("a").next("b"))
        .state(
            ChoiceState::new("b")
                .when(Condition::is_present("$.stop"), "end")
                .otherwise("a"),
        )
        .state(PassState::new("end"))
        .build()
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::DefinitionError);
    assert_eq!(err.code, "SC-DEF-002");
}

#[test]
fn build_unchecked_keeps_invalid_shapes_for_inspection() {
    let definition = WorkflowBuilder::new("dangling")
        .state(PassState::new("a").next("missing"))
        .build_unchecked()
        .unwrap();
    assert_eq!(definition.states[0].successors(), vec!["missing"]);
    assert!(WorkflowBuilder::new("dangling")
        .state(PassState::new("a").next("missing"))
        .build()
        .is_err());
}

#[test]
fn negated_and_expression_conditions_validate() {
    let definition = WorkflowBuilder::new("conditions")
        .state(
            ChoiceState::new("c")
                .when(Condition::negate(Condition::is_present("$.skip")), "run")
                .when(Condition::expr("context.count > 2"), "run")
                .otherwise("end"),
        )
        .state(PassState::new("run").next("end"))
        .state(PassState::new("end"))
        .build()
        .unwrap();
    assert_eq!(definition.states[0].successors(), vec!["run", "run", "end"]);
}

#[test]
fn pipeline_shape_is_testable_without_execution() {
    let definition = build_definition(&PipelineSettings::default()).unwrap();
    let has_results = definition.find_state(HAS_RESULTS).unwrap();
    assert_eq!(has_results.successors(), vec![CHECK_TARGET, SEND_NO_MATCH]);
    let check = definition.find_state(CHECK_TARGET).unwrap();
    assert_eq!(check.successors(), vec![FAN_OUT, SEND_NO_MATCH]);
    assert!(definition.find_state(SEND_NO_MATCH).unwrap().is_terminal());
}

#[test]
fn pipeline_settings_flow_into_parameters() {
    let settings = PipelineSettings {
        input_container: "uploads".into(),
        output_container: "collages".into(),
        notification_topic: "alerts".into(),
        target_label: "Dog".into(),
        match_message: "Dog!".into(),
        no_match_message: "No dog!".into(),
    };
    let definition = build_definition(&settings).unwrap();
    let yaml = definition.to_yaml().unwrap();
    for expected in ["uploads", "collages", "alerts", "Dog!", "No dog!"] {
        assert!(yaml.contains(expected), "missing {} in\n{}", expected, yaml);
    }
    let dot = definition_to_dot(&definition);
    assert!(dot.contains("== 'Dog'"));
}
