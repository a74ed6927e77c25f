#![allow(clippy::result_large_err)]

//! Composition API producing plain [`WorkflowDefinition`] data.
//!
//! ```
//! use seecats::core::workflow_graph::builder::{ChoiceState, PassState, WorkflowBuilder};
//! use seecats::core::workflow_graph::schema::Condition;
//! use serde_json::json;
//!
//! let definition = WorkflowBuilder::new("demo")
//!     .state(PassState::new("start").parameters(json!({"seen": true})).next("decide"))
//!     .state(
//!         ChoiceState::new("decide")
//!             .when(Condition::is_present("$.seen"), "yes")
//!             .otherwise("no"),
//!     )
//!     .state(PassState::new("yes"))
//!     .state(PassState::new("no"))
//!     .build()
//!     .unwrap();
//! assert_eq!(definition.start_at, "start");
//! ```

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::expression::ExpressionEngine;
use crate::core::workflow_graph::schema::{
    Branch, ChoiceRule, Condition, StateKind, StateNode, WorkflowDefinition,
};
use serde_json::{Map, Value};

fn empty_params() -> Value {
    Value::Object(Map::new())
}

/// Builds and validates a top-level definition. The first added state is the
/// entry state unless [`WorkflowBuilder::start_at`] says otherwise.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    name: String,
    comment: Option<String>,
    timeout_seconds: Option<u64>,
    start_at: Option<String>,
    states: Vec<StateNode>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: None,
            timeout_seconds: None,
            start_at: None,
            states: Vec::new(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn start_at(mut self, id: impl Into<String>) -> Self {
        self.start_at = Some(id.into());
        self
    }

    pub fn state(mut self, state: impl Into<StateNode>) -> Self {
        self.states.push(state.into());
        self
    }

    /// Assemble and validate the definition.
    pub fn build(self) -> Result<WorkflowDefinition, AppError> {
        let definition = self.build_unchecked()?;
        definition.validate(&ExpressionEngine::default())?;
        Ok(definition)
    }

    /// Assemble without graph validation, for inspecting rejected shapes.
    pub fn build_unchecked(self) -> Result<WorkflowDefinition, AppError> {
        let start_at = match self.start_at {
            Some(start_at) => start_at,
            None => self
                .states
                .first()
                .map(|state| state.id.clone())
                .ok_or_else(|| {
                    AppError::new(
                        ErrorCategory::DefinitionError,
                        "workflow must define at least one state",
                    )
                    .with_code("SC-DEF-001")
                })?,
        };
        Ok(WorkflowDefinition {
            name: self.name,
            comment: self.comment,
            start_at,
            timeout_seconds: self.timeout_seconds,
            states: self.states,
        })
    }
}

/// Builds one Parallel branch; the first added state is its entry.
#[derive(Debug, Clone, Default)]
pub struct BranchBuilder {
    start_at: Option<String>,
    states: Vec<StateNode>,
}

impl BranchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_at(mut self, id: impl Into<String>) -> Self {
        self.start_at = Some(id.into());
        self
    }

    pub fn state(mut self, state: impl Into<StateNode>) -> Self {
        self.states.push(state.into());
        self
    }

    pub fn build(self) -> Branch {
        let start_at = self
            .start_at
            .or_else(|| self.states.first().map(|state| state.id.clone()))
            .unwrap_or_default();
        Branch {
            start_at,
            states: self.states,
        }
    }
}

impl From<BranchBuilder> for Branch {
    fn from(builder: BranchBuilder) -> Self {
        builder.build()
    }
}

#[derive(Debug, Clone)]
pub struct PassState {
    id: String,
    comment: Option<String>,
    parameters: Value,
    next: Option<String>,
}

impl PassState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            parameters: empty_params(),
            next: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

impl From<PassState> for StateNode {
    fn from(state: PassState) -> Self {
        StateNode {
            id: state.id,
            comment: state.comment,
            kind: StateKind::Pass {
                parameters: state.parameters,
                next: state.next,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskState {
    id: String,
    comment: Option<String>,
    resource: String,
    parameters: Value,
    result_path: Option<String>,
    next: Option<String>,
}

impl TaskState {
    pub fn new(id: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            resource: resource.into(),
            parameters: empty_params(),
            result_path: None,
            next: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Where the operator's result is written; without it the result is discarded.
    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = Some(path.into());
        self
    }

    pub fn next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

impl From<TaskState> for StateNode {
    fn from(state: TaskState) -> Self {
        StateNode {
            id: state.id,
            comment: state.comment,
            kind: StateKind::Task {
                resource: state.resource,
                parameters: state.parameters,
                result_path: state.result_path,
                next: state.next,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChoiceState {
    id: String,
    comment: Option<String>,
    choices: Vec<ChoiceRule>,
    default: String,
}

impl ChoiceState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            choices: Vec::new(),
            default: String::new(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Append a rule; rules are evaluated in the order they were added.
    pub fn when(mut self, condition: Condition, next: impl Into<String>) -> Self {
        self.choices.push(ChoiceRule {
            condition,
            next: next.into(),
        });
        self
    }

    pub fn otherwise(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }
}

impl From<ChoiceState> for StateNode {
    fn from(state: ChoiceState) -> Self {
        StateNode {
            id: state.id,
            comment: state.comment,
            kind: StateKind::Choice {
                choices: state.choices,
                default: state.default,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParallelState {
    id: String,
    comment: Option<String>,
    branches: Vec<Branch>,
    result_path: Option<String>,
    next: Option<String>,
}

impl ParallelState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            branches: Vec::new(),
            result_path: None,
            next: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn branch(mut self, branch: impl Into<Branch>) -> Self {
        self.branches.push(branch.into());
        self
    }

    /// Collect branch outputs as an array at `path` instead of merging them.
    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = Some(path.into());
        self
    }

    pub fn next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

impl From<ParallelState> for StateNode {
    fn from(state: ParallelState) -> Self {
        StateNode {
            id: state.id,
            comment: state.comment,
            kind: StateKind::Parallel {
                branches: state.branches,
                result_path: state.result_path,
                next: state.next,
            },
        }
    }
}
