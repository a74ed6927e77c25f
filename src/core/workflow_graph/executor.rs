#![allow(clippy::result_large_err)] // Executor returns AppError to preserve full diagnostic context; boxing would discard run-time state.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::condition;
use crate::core::workflow_graph::expression::{EvaluationContext, ExpressionEngine};
use crate::core::workflow_graph::operator::{
    resolve_value, ExecutionContext as OperatorContext, OperatorRegistry,
};
use crate::core::workflow_graph::path::ReferencePath;
use crate::core::workflow_graph::schema::{Branch, Scope, StateKind, StateNode, WorkflowDefinition};
use crate::core::workflow_graph::state::{ExecutionStatus, WorkflowExecution};
use crate::core::workflow_graph::store::ExecutionStore;
use crate::core::workflow_graph::trace::{StateOutcome, TraceRecorder, TraceSettings};
use crate::core::workflow_graph::validate;
use chrono::Utc;
use futures::future::{join_all, select_all, BoxFuture};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::Instrument;
use uuid::Uuid;

/// Global execution timeout applied when the definition does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Engine-wide settings fixed at construction.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub default_timeout: Duration,
    pub trace: TraceSettings,
    /// When set, records are persisted at start and at finalisation.
    pub store: Option<ExecutionStore>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            trace: TraceSettings::default(),
            store: None,
        }
    }
}

/// Interprets workflow definitions. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: OperatorRegistry,
    settings: EngineSettings,
    expressions: Arc<ExpressionEngine>,
}

/// A started execution.
pub struct ExecutionHandle {
    pub execution_id: Uuid,
    join: JoinHandle<WorkflowExecution>,
}

impl ExecutionHandle {
    /// Wait for the execution to reach a terminal status.
    pub async fn wait(self) -> Result<WorkflowExecution, AppError> {
        let execution_id = self.execution_id;
        self.join.await.map_err(|err| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("execution {} task failed: {}", execution_id, err),
            )
        })
    }
}

impl WorkflowEngine {
    pub fn new(registry: OperatorRegistry, settings: EngineSettings) -> Self {
        Self {
            registry,
            settings,
            expressions: Arc::new(ExpressionEngine::default()),
        }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate the definition, create a `Running` execution and schedule its
    /// entry state. Must be called from within a Tokio runtime.
    ///
    /// Every call creates a fresh execution id; equivalent triggers are never
    /// deduplicated.
    pub fn start(
        &self,
        definition: Arc<WorkflowDefinition>,
        trigger: Value,
    ) -> Result<ExecutionHandle, AppError> {
        definition.validate(&self.expressions)?;
        validate::validate_grants(&definition, &self.registry)?;

        let timeout = definition
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.settings.default_timeout);
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let out_of_range = || {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("timeout of {} is out of range", humantime::format_duration(timeout)),
            )
        };
        let deadline_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|wall_timeout| started_at.checked_add_signed(wall_timeout))
            .ok_or_else(out_of_range)?;
        let deadline = Instant::now().checked_add(timeout).ok_or_else(out_of_range)?;
        let record = WorkflowExecution::new(
            execution_id,
            definition.name.clone(),
            definition.definition_hash()?,
            trigger.clone(),
            started_at,
            deadline_at,
        );
        if let Some(store) = &self.settings.store {
            store.save(&record)?;
        }

        let run = Run {
            registry: self.registry.clone(),
            expressions: Arc::clone(&self.expressions),
            recorder: TraceRecorder::new(execution_id.to_string(), self.settings.trace),
            execution_id: execution_id.to_string(),
            input: trigger,
            deadline,
            timeout,
        };
        let store = self.settings.store.clone();
        let span = tracing::info_span!(
            "execution",
            execution_id = %execution_id,
            workflow = %definition.name
        );
        tracing::info!(
            execution_id = %execution_id,
            workflow = %definition.name,
            timeout_secs = timeout.as_secs(),
            "execution started"
        );
        let join = tokio::spawn(run.drive(definition, record, store).instrument(span));
        Ok(ExecutionHandle { execution_id, join })
    }

    /// Start an execution and wait for its terminal status.
    pub async fn execute(
        &self,
        definition: Arc<WorkflowDefinition>,
        trigger: Value,
    ) -> Result<WorkflowExecution, AppError> {
        self.start(definition, trigger)?.wait().await
    }
}

/// Why a thread of control stopped before reaching a terminal state.
enum Halt {
    Failed(AppError),
    /// The deadline passed. The active state is left open in the trace.
    TimedOut,
    /// A sibling branch failed.
    Cancelled,
}

/// Cancellation chain of the enclosing Parallel scopes, innermost last.
#[derive(Clone, Default)]
struct CancelSignal {
    chain: Vec<watch::Receiver<bool>>,
}

impl CancelSignal {
    fn child(&self, receiver: watch::Receiver<bool>) -> Self {
        let mut chain = self.chain.clone();
        chain.push(receiver);
        Self { chain }
    }

    fn is_cancelled(&self) -> bool {
        self.chain.iter().any(|rx| *rx.borrow())
    }

    async fn cancelled(&self) {
        if self.chain.is_empty() {
            return std::future::pending().await;
        }
        let waits = self.chain.iter().cloned().map(|mut rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|flag| *flag).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }
}

struct Run {
    registry: OperatorRegistry,
    expressions: Arc<ExpressionEngine>,
    recorder: TraceRecorder,
    execution_id: String,
    input: Value,
    deadline: Instant,
    timeout: Duration,
}

impl Run {
    async fn drive(
        self,
        definition: Arc<WorkflowDefinition>,
        mut record: WorkflowExecution,
        store: Option<ExecutionStore>,
    ) -> WorkflowExecution {
        let mut context = record.input.clone();
        let result = self
            .run_scope(definition.root_scope(), &mut context, &CancelSignal::default())
            .await;
        let trace = self.recorder.snapshot();
        let level = self.recorder.settings().level;

        match result {
            Ok(()) => {
                tracing::info!(execution_id = %self.execution_id, "execution succeeded");
                record.finalize(ExecutionStatus::Succeeded, context, trace, None);
            }
            Err(Halt::Failed(err)) => {
                if level.logs_execution_failures() {
                    tracing::error!(
                        execution_id = %self.execution_id,
                        state_id = err.state_id().unwrap_or("-"),
                        code = %err.code,
                        "execution failed: {}",
                        err.message
                    );
                }
                record.finalize(ExecutionStatus::Failed, context, trace, Some(&err));
            }
            Err(Halt::TimedOut) => {
                let open_states = trace.open_states();
                let mut err = AppError::new(
                    ErrorCategory::TimeoutError,
                    format!(
                        "execution exceeded its deadline of {}",
                        humantime::format_duration(self.timeout)
                    ),
                )
                .with_code("SC-TIME-001");
                err.add_context("open_states", &open_states.join(", "));
                if level.logs_execution_failures() {
                    tracing::error!(
                        execution_id = %self.execution_id,
                        open_states = ?open_states,
                        "execution timed out"
                    );
                }
                record.finalize(ExecutionStatus::TimedOut, context, trace, Some(&err));
            }
            Err(Halt::Cancelled) => {
                let err = AppError::new(
                    ErrorCategory::InternalError,
                    "top-level scope reported cancellation",
                )
                .with_code("SC-EXEC-001");
                record.finalize(ExecutionStatus::Failed, context, trace, Some(&err));
            }
        }

        if let Some(store) = store {
            if let Err(err) = store.save(&record) {
                tracing::warn!(
                    execution_id = %self.execution_id,
                    "failed to persist final execution record: {}",
                    err
                );
            }
        }
        record
    }

    fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn eval_context(&self, context: &Value) -> EvaluationContext {
        EvaluationContext::new(context.clone(), self.input.clone())
    }

    /// Walk one scope from its entry state until a terminal state completes.
    fn run_scope<'a>(
        &'a self,
        scope: Scope<'a>,
        context: &'a mut Value,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<(), Halt>> {
        async move {
            let mut current = scope.start_at;
            loop {
                if self.deadline_passed() {
                    return Err(Halt::TimedOut);
                }
                if cancel.is_cancelled() {
                    return Err(Halt::Cancelled);
                }
                let state = scope.state(current).ok_or_else(|| {
                    Halt::Failed(
                        AppError::new(
                            ErrorCategory::InternalError,
                            format!("state '{}' not found in scope", current),
                        )
                        .with_code("SC-DEF-001"),
                    )
                })?;

                self.recorder.enter(state, context);
                let span = tracing::debug_span!("state", state_id = %state.id);
                let result = self.advance(state, context, cancel).instrument(span).await;
                match result {
                    Ok(next) => {
                        self.recorder.exit(state, context, StateOutcome::Succeeded);
                        match next {
                            Some(next) => current = next,
                            None => return Ok(()),
                        }
                    }
                    Err(Halt::Failed(err)) => {
                        let err = if err.state_id().is_some() {
                            err
                        } else {
                            err.at_state(state.id.clone())
                        };
                        self.recorder
                            .exit(state, context, StateOutcome::failed(&err));
                        return Err(Halt::Failed(err));
                    }
                    Err(Halt::Cancelled) => {
                        self.recorder.exit(state, context, StateOutcome::Cancelled);
                        return Err(Halt::Cancelled);
                    }
                    Err(Halt::TimedOut) => return Err(Halt::TimedOut),
                }
            }
        }
        .boxed()
    }

    /// Execute one state's effect and return its successor.
    async fn advance<'s>(
        &self,
        state: &'s StateNode,
        context: &mut Value,
        cancel: &CancelSignal,
    ) -> Result<Option<&'s str>, Halt> {
        match &state.kind {
            StateKind::Pass { parameters, next } => {
                let resolved =
                    resolve_value(parameters, &self.expressions, &self.eval_context(context))
                        .map_err(Halt::Failed)?;
                merge_fields(context, resolved).map_err(Halt::Failed)?;
                Ok(next.as_deref())
            }
            StateKind::Task {
                resource,
                parameters,
                result_path,
                next,
            } => {
                let output = self
                    .invoke(state, resource, parameters, context, cancel)
                    .await?;
                if let Some(path) = result_path {
                    ReferencePath::parse(path)
                        .and_then(|path| path.set(context, output))
                        .map_err(Halt::Failed)?;
                }
                Ok(next.as_deref())
            }
            StateKind::Choice { choices, default } => {
                let next = condition::select_next(
                    choices,
                    default,
                    &self.expressions,
                    &self.eval_context(context),
                )
                .map_err(Halt::Failed)?;
                tracing::debug!(state_id = %state.id, next, "choice resolved");
                Ok(Some(next))
            }
            StateKind::Parallel {
                branches,
                result_path,
                next,
            } => {
                self.fan_out(branches, result_path.as_deref(), context, cancel)
                    .await?;
                Ok(next.as_deref())
            }
        }
    }

    /// Issue a capability call on its own task and race it against the
    /// deadline and sibling cancellation. Losing the race detaches the call:
    /// it keeps running and its result is discarded.
    async fn invoke(
        &self,
        state: &StateNode,
        resource: &str,
        parameters: &Value,
        context: &Value,
        cancel: &CancelSignal,
    ) -> Result<Value, Halt> {
        let operator = self.registry.get(resource).ok_or_else(|| {
            Halt::Failed(
                AppError::new(
                    ErrorCategory::DefinitionError,
                    format!("capability '{}' is not granted", resource),
                )
                .with_code("SC-DEF-003"),
            )
        })?;
        let params = resolve_value(parameters, &self.expressions, &self.eval_context(context))
            .map_err(Halt::Failed)?;
        operator.validate_params(&params).map_err(Halt::Failed)?;

        let ctx = OperatorContext {
            execution_id: self.execution_id.clone(),
            state_id: state.id.clone(),
            context: context.clone(),
        };
        let mut call =
            tokio::spawn(async move { operator.execute(params, ctx).await }.in_current_span());

        tokio::select! {
            biased;
            _ = sleep_until(self.deadline) => {
                tracing::warn!(
                    state_id = %state.id,
                    resource,
                    "deadline reached while capability call in flight; result will be discarded"
                );
                Err(Halt::TimedOut)
            }
            _ = cancel.cancelled() => {
                tracing::debug!(state_id = %state.id, resource, "call detached after sibling failure");
                Err(Halt::Cancelled)
            }
            joined = &mut call => match joined {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(err)) => Err(Halt::Failed(err)),
                Err(join_err) => Err(Halt::Failed(
                    AppError::new(
                        ErrorCategory::CapabilityInvocationError,
                        format!("{} call aborted: {}", resource, join_err),
                    )
                    .with_code("SC-CAP-003"),
                )),
            }
        }
    }

    /// Run every branch concurrently on a clone of the scope-entry context.
    ///
    /// The first failing branch cancels its siblings; the scope still waits for
    /// every branch to settle. A timeout in any branch wins over a failure.
    async fn fan_out(
        &self,
        branches: &[Branch],
        result_path: Option<&str>,
        context: &mut Value,
        cancel: &CancelSignal,
    ) -> Result<(), Halt> {
        let (tx, rx) = watch::channel(false);
        let scope_cancel = cancel.child(rx);
        let tx = &tx;
        let entry_context = context.clone();

        let runs = branches.iter().enumerate().map(|(index, branch)| {
            let mut branch_context = entry_context.clone();
            let scope_cancel = scope_cancel.clone();
            async move {
                let result = self
                    .run_scope(branch.scope(), &mut branch_context, &scope_cancel)
                    .await;
                if let Err(Halt::Failed(err)) = &result {
                    tracing::debug!(
                        branch = index,
                        code = %err.code,
                        "branch failed; cancelling siblings"
                    );
                    tx.send_replace(true);
                }
                result.map(|()| branch_context)
            }
        });
        let results = join_all(runs).await;

        let mut outputs = Vec::with_capacity(results.len());
        let mut failure: Option<AppError> = None;
        let mut timed_out = false;
        let mut cancelled = false;
        for result in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(Halt::TimedOut) => timed_out = true,
                Err(Halt::Failed(err)) => {
                    if failure.is_none() {
                        failure = Some(err);
                    }
                }
                Err(Halt::Cancelled) => cancelled = true,
            }
        }
        if timed_out {
            return Err(Halt::TimedOut);
        }
        if let Some(err) = failure {
            return Err(Halt::Failed(err));
        }
        if cancelled {
            return Err(Halt::Cancelled);
        }

        match result_path {
            Some(path) => ReferencePath::parse(path)
                .and_then(|path| path.set(context, Value::Array(outputs)))
                .map_err(Halt::Failed)?,
            None => {
                for output in &outputs {
                    apply_patch(context, output);
                }
            }
        }
        Ok(())
    }
}

/// Pass-state write: overwrite top-level fields of the context.
fn merge_fields(context: &mut Value, fields: Value) -> Result<(), AppError> {
    let Value::Object(fields) = fields else {
        return Err(AppError::new(
            ErrorCategory::MalformedInputError,
            "Pass parameters must resolve to an object",
        )
        .with_code("SC-INPUT-003"));
    };
    if !context.is_object() {
        *context = Value::Object(Map::new());
    }
    if let Value::Object(target) = context {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    Ok(())
}

fn apply_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => apply_patch(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target_value, patch_value) => {
            *target_value = patch_value.clone();
        }
    }
}
