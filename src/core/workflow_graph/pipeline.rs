#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow_graph::builder::{
    BranchBuilder, ChoiceState, ParallelState, PassState, TaskState, WorkflowBuilder,
};
use crate::core::workflow_graph::operators::{artifact, classify, notify};
use crate::core::workflow_graph::schema::{Condition, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const PIPELINE_NAME: &str = "seecats";

pub const TRANSFORM_INPUT: &str = "Transform Input";
pub const DETECT_LABELS: &str = "DetectLabels";
pub const HAS_RESULTS: &str = "Has results?";
pub const CHECK_TARGET: &str = "Check Cats";
pub const FAN_OUT: &str = "Parallel";
pub const SEND_MATCH: &str = "Send cat notification";
pub const GENERATE_COLLAGE: &str = "Invoke Generate Collage";
pub const SEND_NO_MATCH: &str = "Send no cat notification";

/// Context field holding the raw label list.
pub const RESULT_FIELD: &str = "classificationResult";

/// Values bound into the pipeline at definition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_input_container")]
    pub input_container: String,
    #[serde(default = "default_output_container")]
    pub output_container: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
    #[serde(default = "default_target_label")]
    pub target_label: String,
    #[serde(default = "default_match_message")]
    pub match_message: String,
    #[serde(default = "default_no_match_message")]
    pub no_match_message: String,
}

fn default_input_container() -> String {
    "seecats-inputs".to_string()
}

fn default_output_container() -> String {
    "seecats-output".to_string()
}

fn default_notification_topic() -> String {
    "seecats-notifications".to_string()
}

fn default_target_label() -> String {
    "Cat".to_string()
}

fn default_match_message() -> String {
    "Cat!".to_string()
}

fn default_no_match_message() -> String {
    "No cat!".to_string()
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            input_container: default_input_container(),
            output_container: default_output_container(),
            notification_topic: default_notification_topic(),
            target_label: default_target_label(),
            match_message: default_match_message(),
            no_match_message: default_no_match_message(),
        }
    }
}

/// Build the classify-and-act workflow:
///
/// Transform Input → DetectLabels → Has results? → Check Cats → Parallel
/// (notify + collage), with every negative decision routed to the single
/// no-match notification.
pub fn build_definition(settings: &PipelineSettings) -> Result<WorkflowDefinition, AppError> {
    let first_label = format!("$.{}[0]", RESULT_FIELD);

    WorkflowBuilder::new(PIPELINE_NAME)
        .comment("Classify a newly stored image and act on the top label")
        .state(
            PassState::new(TRANSFORM_INPUT)
                .parameters(json!({"image": {"$path": "$.detail.object.key"}}))
                .next(DETECT_LABELS),
        )
        .state(
            TaskState::new(DETECT_LABELS, classify::DETECT_LABELS)
                .parameters(json!({
                    "container": settings.input_container,
                    "key": {"$path": "$.image"},
                    "label_filter": [settings.target_label],
                }))
                .result_path(format!("$.{}", RESULT_FIELD))
                .next(HAS_RESULTS),
        )
        .state(
            ChoiceState::new(HAS_RESULTS)
                .when(Condition::is_present(first_label.clone()), CHECK_TARGET)
                .otherwise(SEND_NO_MATCH),
        )
        .state(
            ChoiceState::new(CHECK_TARGET)
                .when(
                    Condition::string_equals(
                        format!("{}.name", first_label),
                        settings.target_label.clone(),
                    ),
                    FAN_OUT,
                )
                .otherwise(SEND_NO_MATCH),
        )
        .state(
            ParallelState::new(FAN_OUT)
                .branch(
                    BranchBuilder::new().state(TaskState::new(SEND_MATCH, notify::PUBLISH).parameters(
                        json!({
                            "topic": settings.notification_topic,
                            "message": settings.match_message,
                        }),
                    )),
                )
                .branch(
                    BranchBuilder::new().state(
                        TaskState::new(GENERATE_COLLAGE, artifact::GENERATE).parameters(json!({
                            "source_container": settings.input_container,
                            "destination_container": settings.output_container,
                        })),
                    ),
                ),
        )
        .state(
            TaskState::new(SEND_NO_MATCH, notify::PUBLISH).parameters(json!({
                "topic": settings.notification_topic,
                "message": settings.no_match_message,
            })),
        )
        .build()
}
