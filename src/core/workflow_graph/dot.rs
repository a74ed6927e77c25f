use crate::core::workflow_graph::schema::{Condition, StateKind, StateNode, WorkflowDefinition};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// Node weight carrying state display information.
struct StateLabel {
    id: String,
    detail: String,
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\n{}", escape_label(&self.id), escape_label(&self.detail))
    }
}

/// Edge weight carrying a formatted transition label.
struct EdgeData {
    label: String,
}

impl fmt::Display for EdgeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn build_graph(definition: &WorkflowDefinition) -> DiGraph<StateLabel, EdgeData> {
    let mut graph = DiGraph::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();

    for state in definition.all_states() {
        let detail = match &state.kind {
            StateKind::Task { resource, .. } => format!("Task {}", resource),
            other => other.name().to_string(),
        };
        let idx = graph.add_node(StateLabel {
            id: state.id.clone(),
            detail,
        });
        node_map.insert(state.id.as_str(), idx);
    }

    let mut edge = |graph: &mut DiGraph<StateLabel, EdgeData>, from: &str, to: &str, label: String| {
        if let (Some(&a), Some(&b)) = (node_map.get(from), node_map.get(to)) {
            graph.add_edge(a, b, EdgeData { label });
        }
    };

    for state in definition.all_states() {
        match &state.kind {
            StateKind::Pass { next, .. } | StateKind::Task { next, .. } => {
                if let Some(next) = next {
                    edge(&mut graph, &state.id, next, String::new());
                }
            }
            StateKind::Choice { choices, default } => {
                for rule in choices {
                    let label = escape_label(&truncate(&describe(&rule.condition), 60));
                    edge(&mut graph, &state.id, &rule.next, label);
                }
                edge(&mut graph, &state.id, default, "default".to_string());
            }
            StateKind::Parallel { branches, next, .. } => {
                for (index, branch) in branches.iter().enumerate() {
                    edge(
                        &mut graph,
                        &state.id,
                        &branch.start_at,
                        format!("branch {}", index),
                    );
                    if let Some(next) = next {
                        for terminal in branch.states.iter().filter(|s| s.is_terminal()) {
                            edge(&mut graph, &terminal.id, next, "join".to_string());
                        }
                    }
                }
            }
        }
    }

    graph
}

/// Render the definition as a Graphviz DOT string using petgraph.
pub fn definition_to_dot(definition: &WorkflowDefinition) -> String {
    let graph = build_graph(definition);
    format!("{}", Dot::new(&graph))
}

/// Human-readable predicate text.
pub fn describe(condition: &Condition) -> String {
    match condition {
        Condition::IsPresent { path } => format!("isPresent({})", path),
        Condition::StringEquals { path, value } => format!("{} == '{}'", path, value),
        Condition::Not { condition } => format!("not({})", describe(condition)),
        Condition::Expr { expr } => format!("expr: {}", expr),
    }
}

/// Terminal states of the top-level scope.
pub fn terminal_states(definition: &WorkflowDefinition) -> Vec<&StateNode> {
    definition
        .states
        .iter()
        .filter(|state| state.is_terminal())
        .collect()
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        value.to_string()
    } else {
        let head: String = value.chars().take(limit).collect();
        format!("{}...", head)
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\"', "\\\"")
}
