//! Append-only execution trace.
//!
//! The recorder stores raw enter/exit events in arrival order; entries for
//! reporting are folded from those events. A state that was entered but never
//! exited (the engine gave up on it at the deadline) keeps `exited_at: None`.

use crate::core::error::AppError;
use crate::core::workflow_graph::schema::StateNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which trace events are mirrored to `tracing` (the in-memory trace is always complete).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    #[default]
    All,
    Error,
    Fatal,
    Off,
}

impl TraceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::All => "all",
            TraceLevel::Error => "error",
            TraceLevel::Fatal => "fatal",
            TraceLevel::Off => "off",
        }
    }

    fn logs_transitions(&self) -> bool {
        matches!(self, TraceLevel::All)
    }

    fn logs_state_failures(&self) -> bool {
        matches!(self, TraceLevel::All | TraceLevel::Error)
    }

    /// Execution-level failures (Failed / TimedOut).
    pub fn logs_execution_failures(&self) -> bool {
        !matches!(self, TraceLevel::Off)
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TraceLevel::All),
            "error" => Ok(TraceLevel::Error),
            "fatal" => Ok(TraceLevel::Fatal),
            "off" => Ok(TraceLevel::Off),
            other => Err(format!("unknown trace level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSettings {
    #[serde(default)]
    pub level: TraceLevel,
    /// Store context snapshots in trace events.
    #[serde(default = "default_include_execution_data")]
    pub include_execution_data: bool,
}

fn default_include_execution_data() -> bool {
    true
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            level: TraceLevel::All,
            include_execution_data: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    Entered,
    Exited,
}

/// How a state was left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StateOutcome {
    Succeeded,
    Failed {
        category: String,
        code: String,
        message: String,
    },
    /// A sibling branch failed first.
    Cancelled,
}

impl StateOutcome {
    pub fn failed(error: &AppError) -> Self {
        StateOutcome::Failed {
            category: error.category.as_str().to_string(),
            code: error.code.clone(),
            message: error.message.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, StateOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub seq: u64,
    pub state_id: String,
    pub state_type: String,
    pub kind: TraceEventKind,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StateOutcome>,
}

/// One state visit: `{state id, entry timestamp, exit timestamp, context snapshot, outcome}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub state_id: String,
    pub state_type: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    /// Snapshot at exit, or at entry while the state is still open.
    pub context: Option<Value>,
    pub outcome: Option<StateOutcome>,
}

/// Immutable view of the recorded events.
///
/// A deadline adds no event. States still running when it passes stay open
/// (`exited_at` and `outcome` are `None`, see [`ExecutionTrace::open_states`]);
/// the `TimeoutError` itself is carried by the execution's `error`
/// (`SC-TIME-001`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub events: Vec<TraceEvent>,
}

impl ExecutionTrace {
    /// Entries ordered by entry time.
    pub fn entries(&self) -> Vec<TraceEntry> {
        let mut entries: Vec<TraceEntry> = Vec::new();
        for event in &self.events {
            match event.kind {
                TraceEventKind::Entered => entries.push(TraceEntry {
                    state_id: event.state_id.clone(),
                    state_type: event.state_type.clone(),
                    entered_at: event.at,
                    exited_at: None,
                    context: event.context.clone(),
                    outcome: None,
                }),
                TraceEventKind::Exited => {
                    if let Some(entry) = entries
                        .iter_mut()
                        .rev()
                        .find(|entry| entry.state_id == event.state_id && entry.exited_at.is_none())
                    {
                        entry.exited_at = Some(event.at);
                        if event.context.is_some() {
                            entry.context = event.context.clone();
                        }
                        entry.outcome = event.outcome.clone();
                    }
                }
            }
        }
        entries
    }

    /// State ids in the order they were entered.
    pub fn state_ids(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|event| event.kind == TraceEventKind::Entered)
            .map(|event| event.state_id.as_str())
            .collect()
    }

    /// States entered but not yet exited.
    pub fn open_states(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.exited_at.is_none())
            .map(|entry| entry.state_id)
            .collect()
    }

    pub fn entry(&self, state_id: &str) -> Option<TraceEntry> {
        self.entries()
            .into_iter()
            .find(|entry| entry.state_id == state_id)
    }

    pub fn was_entered(&self, state_id: &str) -> bool {
        self.state_ids().contains(&state_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Shared, append-only recorder handed to every branch of an execution.
#[derive(Clone)]
pub struct TraceRecorder {
    execution_id: String,
    settings: TraceSettings,
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceRecorder {
    pub fn new(execution_id: impl Into<String>, settings: TraceSettings) -> Self {
        Self {
            execution_id: execution_id.into(),
            settings,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> TraceSettings {
        self.settings
    }

    pub fn enter(&self, state: &StateNode, context: &Value) {
        if self.settings.level.logs_transitions() {
            tracing::info!(
                execution_id = %self.execution_id,
                state_id = %state.id,
                state_type = state.kind.name(),
                "state entered"
            );
        }
        self.push(state, TraceEventKind::Entered, context, None);
    }

    pub fn exit(&self, state: &StateNode, context: &Value, outcome: StateOutcome) {
        match &outcome {
            StateOutcome::Failed { code, message, .. } if self.settings.level.logs_state_failures() => {
                tracing::error!(
                    execution_id = %self.execution_id,
                    state_id = %state.id,
                    code = %code,
                    "state failed: {}",
                    message
                );
            }
            StateOutcome::Cancelled if self.settings.level.logs_state_failures() => {
                tracing::warn!(
                    execution_id = %self.execution_id,
                    state_id = %state.id,
                    "state cancelled"
                );
            }
            StateOutcome::Succeeded if self.settings.level.logs_transitions() => {
                tracing::info!(
                    execution_id = %self.execution_id,
                    state_id = %state.id,
                    "state exited"
                );
            }
            _ => {}
        }
        self.push(state, TraceEventKind::Exited, context, Some(outcome));
    }

    pub fn snapshot(&self) -> ExecutionTrace {
        ExecutionTrace {
            events: self.lock().clone(),
        }
    }

    fn push(
        &self,
        state: &StateNode,
        kind: TraceEventKind,
        context: &Value,
        outcome: Option<StateOutcome>,
    ) {
        let mut events = self.lock();
        let seq = events.len() as u64;
        events.push(TraceEvent {
            seq,
            state_id: state.id.clone(),
            state_type: state.kind.name().to_string(),
            kind,
            at: Utc::now(),
            context: self
                .settings
                .include_execution_data
                .then(|| context.clone()),
            outcome,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
