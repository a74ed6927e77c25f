use crate::core::error::AppError;
use crate::core::workflow_graph::trace::ExecutionTrace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Version embedded in persisted execution files.
pub const WORKFLOW_EXECUTION_FORMAT_VERSION: &str = "1";

/// Execution status; every status except `Running` is final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[default]
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Succeeded => "Succeeded",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::TimedOut => "TimedOut",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simplified summary of the error that terminated an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppErrorSummary {
    pub code: String,
    pub category: String,
    pub message: String,
    /// State at which the error surfaced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
}

impl From<&AppError> for AppErrorSummary {
    fn from(error: &AppError) -> Self {
        AppErrorSummary {
            code: error.code.clone(),
            category: error.category.as_str().to_string(),
            message: error.message.clone(),
            state_id: error.state_id().map(str::to_string),
        }
    }
}

/// One runtime instance of a workflow definition processing one trigger event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub format_version: String,
    pub execution_id: Uuid,
    pub definition_name: String,
    pub definition_hash: String,
    /// Trigger payload exactly as received.
    pub input: Value,
    pub context: Value,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trace: ExecutionTrace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AppErrorSummary>,
}

impl WorkflowExecution {
    pub fn new(
        execution_id: Uuid,
        definition_name: impl Into<String>,
        definition_hash: impl Into<String>,
        input: Value,
        started_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        WorkflowExecution {
            format_version: WORKFLOW_EXECUTION_FORMAT_VERSION.to_string(),
            execution_id,
            definition_name: definition_name.into(),
            definition_hash: definition_hash.into(),
            context: input.clone(),
            input,
            status: ExecutionStatus::Running,
            started_at,
            deadline,
            completed_at: None,
            trace: ExecutionTrace::default(),
            error: None,
        }
    }

    /// States currently being executed; more than one only inside a Parallel scope.
    pub fn current_states(&self) -> Vec<String> {
        self.trace.open_states()
    }

    /// Fix the final status. Has no effect on an already finalized execution.
    pub fn finalize(
        &mut self,
        status: ExecutionStatus,
        context: Value,
        trace: ExecutionTrace,
        error: Option<&AppError>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.context = context;
        self.trace = trace;
        self.error = error.map(AppErrorSummary::from);
        self.completed_at = Some(Utc::now());
    }
}
