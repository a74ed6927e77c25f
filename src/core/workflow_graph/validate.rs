#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::expression::ExpressionEngine;
use crate::core::workflow_graph::operator::OperatorRegistry;
use crate::core::workflow_graph::path::ReferencePath;
use crate::core::workflow_graph::schema::{
    Condition, Scope, StateKind, WorkflowDefinition, MAX_TIMEOUT_SECONDS,
};
use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde_json::Value;
use std::collections::HashSet;

fn structural(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::DefinitionError, message).with_code("SC-DEF-001")
}

/// Validate the definition graph. Runs before any execution is created.
pub fn validate_definition(
    definition: &WorkflowDefinition,
    engine: &ExpressionEngine,
) -> Result<(), AppError> {
    if definition.name.trim().is_empty() {
        return Err(structural("workflow name must not be empty"));
    }
    match definition.timeout_seconds {
        Some(0) => return Err(structural("timeout_seconds must be >= 1")),
        Some(seconds) if seconds > MAX_TIMEOUT_SECONDS => {
            return Err(structural(format!(
                "timeout_seconds must be <= {}",
                MAX_TIMEOUT_SECONDS
            )))
        }
        _ => {}
    }

    let mut ids = HashSet::new();
    for state in definition.all_states() {
        if state.id.trim().is_empty() {
            return Err(structural("state ids must not be empty"));
        }
        if !ids.insert(state.id.as_str()) {
            return Err(structural(format!("duplicate state id: {}", state.id)));
        }
    }

    validate_scope(definition.root_scope(), "workflow", engine)
}

fn validate_scope(scope: Scope<'_>, label: &str, engine: &ExpressionEngine) -> Result<(), AppError> {
    if scope.states.is_empty() {
        return Err(structural(format!("{} must define at least one state", label)));
    }
    if scope.state(scope.start_at).is_none() {
        return Err(structural(format!(
            "start_at '{}' of {} is not a state in that scope",
            scope.start_at, label
        )));
    }

    for state in scope.states {
        for successor in state.successors() {
            if scope.state(successor).is_none() {
                return Err(structural(format!(
                    "state '{}' references unknown successor '{}' (successors must stay within {})",
                    state.id, successor, label
                )));
            }
        }
        match &state.kind {
            StateKind::Pass { parameters, .. } => {
                if !parameters.is_object() {
                    return Err(structural(format!(
                        "pass '{}' parameters must be an object",
                        state.id
                    )));
                }
                validate_template(parameters, engine)?;
            }
            StateKind::Task {
                resource,
                parameters,
                result_path,
                ..
            } => {
                if resource.trim().is_empty() {
                    return Err(structural(format!("task '{}' has empty resource", state.id)));
                }
                validate_template(parameters, engine)?;
                if let Some(path) = result_path {
                    validate_write_target(path)?;
                }
            }
            StateKind::Choice { choices, .. } => {
                if choices.is_empty() {
                    return Err(structural(format!(
                        "choice '{}' must define at least one rule",
                        state.id
                    )));
                }
                for rule in choices {
                    validate_condition(&rule.condition, engine)?;
                }
            }
            StateKind::Parallel {
                branches,
                result_path,
                ..
            } => {
                if branches.is_empty() {
                    return Err(structural(format!(
                        "parallel '{}' must define at least one branch",
                        state.id
                    )));
                }
                if let Some(path) = result_path {
                    validate_write_target(path)?;
                }
                for (index, branch) in branches.iter().enumerate() {
                    let branch_label = format!("branch {} of '{}'", index, state.id);
                    validate_scope(branch.scope(), &branch_label, engine)?;
                }
            }
        }
    }

    let (graph, node_map) = build_state_graph(scope);
    for component in tarjan_scc(&graph) {
        let is_cycle = if component.len() > 1 {
            true
        } else {
            let idx = component[0];
            graph.find_edge(idx, idx).is_some()
        };
        if is_cycle {
            let mut members: Vec<&str> = node_map
                .iter()
                .filter(|(_, idx)| component.contains(idx))
                .map(|(id, _)| *id)
                .collect();
            members.sort_unstable();
            return Err(AppError::new(
                ErrorCategory::DefinitionError,
                format!("{} contains a cycle through {}", label, members.join(", ")),
            )
            .with_code("SC-DEF-002"));
        }
    }

    let entry = node_map[scope.start_at];
    let mut reachable = HashSet::new();
    let mut bfs = Bfs::new(&graph, entry);
    while let Some(nx) = bfs.next(&graph) {
        reachable.insert(nx);
    }
    let extra_entries: Vec<&str> = node_map
        .iter()
        .filter(|(_, idx)| !reachable.contains(*idx))
        .map(|(id, _)| *id)
        .collect();
    if !extra_entries.is_empty() {
        return Err(structural(format!(
            "{} must have exactly one entry state; unreachable from '{}': {}",
            label,
            scope.start_at,
            extra_entries.join(", ")
        )));
    }

    if !scope.states.iter().any(|state| state.is_terminal()) {
        return Err(structural(format!("{} has no terminal state", label)));
    }

    Ok(())
}

/// Reject definitions that invoke capabilities the engine was not granted.
pub fn validate_grants(
    definition: &WorkflowDefinition,
    registry: &OperatorRegistry,
) -> Result<(), AppError> {
    for state in definition.all_states() {
        if let StateKind::Task { resource, .. } = &state.kind {
            if registry.get(resource).is_none() {
                return Err(AppError::new(
                    ErrorCategory::DefinitionError,
                    format!(
                        "task '{}' requires capability '{}' which is not granted",
                        state.id, resource
                    ),
                )
                .with_code("SC-DEF-003"));
            }
        }
    }
    Ok(())
}

fn build_state_graph<'a>(scope: Scope<'a>) -> (DiGraph<(), ()>, IndexMap<&'a str, NodeIndex>) {
    let mut graph = DiGraph::<(), ()>::new();
    let mut node_map: IndexMap<&'a str, NodeIndex> = IndexMap::new();

    for state in scope.states {
        let idx = graph.add_node(());
        node_map.insert(state.id.as_str(), idx);
    }

    for state in scope.states {
        if let Some(&from) = node_map.get(state.id.as_str()) {
            for successor in state.successors() {
                if let Some(&to) = node_map.get(successor) {
                    graph.update_edge(from, to, ());
                }
            }
        }
    }

    (graph, node_map)
}

fn validate_write_target(raw: &str) -> Result<(), AppError> {
    let path = ReferencePath::parse(raw)?;
    if !path.is_writable() {
        return Err(AppError::new(
            ErrorCategory::DefinitionError,
            format!("result path '{}' must only address object fields", raw),
        )
        .with_code("SC-DEF-004"));
    }
    Ok(())
}

fn validate_condition(condition: &Condition, engine: &ExpressionEngine) -> Result<(), AppError> {
    match condition {
        Condition::IsPresent { path } | Condition::StringEquals { path, .. } => {
            ReferencePath::parse(path).map(|_| ())
        }
        Condition::Not { condition } => validate_condition(condition, engine),
        Condition::Expr { expr } => engine.compile(expr).map(|_| ()),
    }
}

/// Check every `$path` / `$expr` placeholder inside a parameter template.
fn validate_template(value: &Value, engine: &ExpressionEngine) -> Result<(), AppError> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(path)) = map.get("$path") {
                    return ReferencePath::parse(path).map(|_| ());
                }
                if let Some(Value::String(expr)) = map.get("$expr") {
                    return engine.compile(expr).map(|_| ());
                }
            }
            for child in map.values() {
                validate_template(child, engine)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                validate_template(item, engine)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
