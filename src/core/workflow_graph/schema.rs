#![allow(clippy::result_large_err)] // Workflow schema APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::expression::ExpressionEngine;
use crate::core::workflow_graph::validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Upper bound for any execution timeout: one year.
pub const MAX_TIMEOUT_SECONDS: u64 = 366 * 24 * 60 * 60;

fn default_params_value() -> Value {
    Value::Object(Map::new())
}

/// Immutable, acyclic graph of states interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub start_at: String,
    /// Overrides the engine's default execution timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    pub states: Vec<StateNode>,
}

/// A single node of the workflow graph.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StateNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub kind: StateKind,
}

/// Kind-specific parameters and successor wiring.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
    /// Pure context rewrite: resolved `parameters` are merged into the context.
    Pass {
        #[serde(default = "default_params_value")]
        parameters: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    /// Invocation of a granted external capability.
    Task {
        resource: String,
        #[serde(default = "default_params_value")]
        parameters: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    /// Ordered predicate list; the first match wins, otherwise `default`.
    Choice {
        choices: Vec<ChoiceRule>,
        default: String,
    },
    /// Independent branches run concurrently; `next` is taken after all complete.
    Parallel {
        branches: Vec<Branch>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
}

/// Predicate/successor pair of a Choice state.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChoiceRule {
    pub condition: Condition,
    pub next: String,
}

/// Independent sub-graph executed inside a Parallel scope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Branch {
    pub start_at: String,
    pub states: Vec<StateNode>,
}

/// Predicate evaluated by Choice states over the execution context.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    IsPresent { path: String },
    /// Case-sensitive exact match; missing or non-string values never match.
    StringEquals { path: String, value: String },
    Not { condition: Box<Condition> },
    Expr { expr: String },
}

impl Condition {
    pub fn is_present(path: impl Into<String>) -> Self {
        Condition::IsPresent { path: path.into() }
    }

    pub fn string_equals(path: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::StringEquals {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Not {
            condition: Box::new(condition),
        }
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        Condition::Expr { expr: expr.into() }
    }
}

/// Borrowed view over a set of states sharing one entry point: the top-level
/// graph or a single Parallel branch.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub start_at: &'a str,
    pub states: &'a [StateNode],
}

impl<'a> Scope<'a> {
    pub fn state(&self, id: &str) -> Option<&'a StateNode> {
        self.states.iter().find(|state| state.id == id)
    }
}

impl StateKind {
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Pass { .. } => "Pass",
            StateKind::Task { .. } => "Task",
            StateKind::Choice { .. } => "Choice",
            StateKind::Parallel { .. } => "Parallel",
        }
    }
}

impl StateNode {
    /// Successor ids in declaration order (Choice rules first, then default).
    pub fn successors(&self) -> Vec<&str> {
        match &self.kind {
            StateKind::Pass { next, .. }
            | StateKind::Task { next, .. }
            | StateKind::Parallel { next, .. } => next.iter().map(String::as_str).collect(),
            StateKind::Choice { choices, default } => choices
                .iter()
                .map(|rule| rule.next.as_str())
                .chain(std::iter::once(default.as_str()))
                .collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl Branch {
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            start_at: &self.start_at,
            states: &self.states,
        }
    }
}

impl WorkflowDefinition {
    pub fn root_scope(&self) -> Scope<'_> {
        Scope {
            start_at: &self.start_at,
            states: &self.states,
        }
    }

    /// Depth-first walk over every state, including those nested in branches.
    pub fn all_states(&self) -> Vec<&StateNode> {
        fn walk<'a>(states: &'a [StateNode], out: &mut Vec<&'a StateNode>) {
            for state in states {
                out.push(state);
                if let StateKind::Parallel { branches, .. } = &state.kind {
                    for branch in branches {
                        walk(&branch.states, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.states, &mut out);
        out
    }

    pub fn find_state(&self, id: &str) -> Option<&StateNode> {
        self.all_states().into_iter().find(|state| state.id == id)
    }

    /// Load and validate a workflow definition from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        let definition = Self::from_yaml(&text).map_err(|err| {
            err.with_context(format!("while loading {}", path.display()))
        })?;
        Ok(definition)
    }

    pub fn from_yaml(text: &str) -> Result<Self, AppError> {
        let definition: WorkflowDefinition = serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::DefinitionError,
                format!("failed to parse workflow definition: {}", err),
            )
            .with_code("SC-DEF-001")
        })?;
        definition.validate(&ExpressionEngine::default())?;
        Ok(definition)
    }

    pub fn to_yaml(&self) -> Result<String, AppError> {
        serde_yaml::to_string(self).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to render workflow definition: {}", err),
            )
        })
    }

    /// Validate graph structure (ids, successors, entry, terminals, cycles, paths).
    pub fn validate(&self, engine: &ExpressionEngine) -> Result<(), AppError> {
        validate::validate_definition(self, engine)
    }

    /// SHA-256 of the canonical JSON rendering, recorded with each execution.
    pub fn definition_hash(&self) -> Result<String, AppError> {
        let bytes = serde_json::to_vec(self).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to serialize workflow definition: {}", err),
            )
        })?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }
}

pub fn load_definition(path: &Path) -> Result<WorkflowDefinition, AppError> {
    WorkflowDefinition::load_from_file(path)
}
