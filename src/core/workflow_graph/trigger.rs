#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow_graph::executor::{ExecutionHandle, WorkflowEngine};
use crate::core::workflow_graph::schema::WorkflowDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub const STORAGE_EVENT_SOURCE: &str = "aws.s3";
pub const OBJECT_CREATED: &str = "Object Created";

/// Filter deciding which storage events start an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRule {
    pub source: String,
    pub detail_type: String,
    /// When set, `detail.bucket.name` must equal this container.
    #[serde(default)]
    pub container: Option<String>,
}

impl Default for EventRule {
    fn default() -> Self {
        Self {
            source: STORAGE_EVENT_SOURCE.to_string(),
            detail_type: OBJECT_CREATED.to_string(),
            container: None,
        }
    }
}

impl EventRule {
    pub fn for_container(container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &Value) -> bool {
        let field = |name: &str| event.get(name).and_then(Value::as_str);
        if field("source") != Some(self.source.as_str()) {
            return false;
        }
        if field("detail-type") != Some(self.detail_type.as_str()) {
            return false;
        }
        match &self.container {
            Some(container) => {
                event
                    .pointer("/detail/bucket/name")
                    .and_then(Value::as_str)
                    == Some(container.as_str())
            }
            None => true,
        }
    }
}

/// Object reference carried by a trigger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub container: Option<String>,
    pub key: Option<String>,
}

impl StartRequest {
    pub fn from_event(event: &Value) -> Self {
        let text = |pointer: &str| {
            event
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            container: text("/detail/bucket/name"),
            key: text("/detail/object/key"),
        }
    }
}

/// Routes matching events to exactly one new execution each.
#[derive(Clone)]
pub struct TriggerRouter {
    engine: WorkflowEngine,
    definition: Arc<WorkflowDefinition>,
    rule: EventRule,
}

impl TriggerRouter {
    pub fn new(engine: WorkflowEngine, definition: Arc<WorkflowDefinition>, rule: EventRule) -> Self {
        Self {
            engine,
            definition,
            rule,
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn rule(&self) -> &EventRule {
        &self.rule
    }

    /// Start an execution for `event`, or return `None` when the rule does not match.
    ///
    /// A matching event without an object key still starts an execution; it
    /// fails in the input transform with `MalformedInputError`.
    pub fn dispatch(&self, event: Value) -> Result<Option<ExecutionHandle>, AppError> {
        if !self.rule.matches(&event) {
            tracing::debug!(
                source = ?event.get("source"),
                detail_type = ?event.get("detail-type"),
                "event ignored by rule"
            );
            return Ok(None);
        }
        let request = StartRequest::from_event(&event);
        tracing::info!(
            container = request.container.as_deref().unwrap_or("-"),
            key = request.key.as_deref().unwrap_or("-"),
            "trigger accepted"
        );
        let handle = self.engine.start(Arc::clone(&self.definition), event)?;
        Ok(Some(handle))
    }
}
