use crate::cli::args::{GraphArgs, GraphFormat, RunArgs, ServeArgs, StatusArgs, ValidateArgs};
use crate::core::config::SeeCatsConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::capability::http::HttpCapabilityClient;
use crate::core::workflow_graph::dot::definition_to_dot;
use crate::core::workflow_graph::executor::{EngineSettings, WorkflowEngine};
use crate::core::workflow_graph::operator::OperatorRegistry;
use crate::core::workflow_graph::operators::capability_registry;
use crate::core::workflow_graph::pipeline::build_definition;
use crate::core::workflow_graph::schema::{load_definition, WorkflowDefinition};
use crate::core::workflow_graph::state::{ExecutionStatus, WorkflowExecution};
use crate::core::workflow_graph::store::ExecutionStore;
use crate::core::workflow_graph::trigger::{EventRule, TriggerRouter};
use crate::core::workflow_graph::validate::validate_grants;
use crate::core::workflow_graph::webhook::serve_webhook;
use crate::Result;
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub async fn run(args: RunArgs, config: &SeeCatsConfig) -> Result<()> {
    let content = std::fs::read_to_string(&args.event)
        .with_context(|| format!("failed to read event file {}", args.event.display()))?;
    let event: Value = serde_json::from_str(&content)
        .with_context(|| format!("event file {} is not valid JSON", args.event.display()))?;

    let mut definition = resolve_definition(args.definition.as_deref(), config)?;
    if let Some(seconds) = args.timeout {
        definition.timeout_seconds = Some(seconds);
    }

    let engine = build_engine(config)?;
    tracing::info!(workflow = %definition.name, event = %args.event.display(), "running workflow");
    let execution = engine.execute(Arc::new(definition), event).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        print_execution(&execution);
    }

    if execution.status != ExecutionStatus::Succeeded {
        return Err(anyhow!(
            "execution {} finished with status {}",
            execution.execution_id,
            execution.status
        ));
    }
    Ok(())
}

pub async fn serve(args: ServeArgs, config: &SeeCatsConfig) -> Result<()> {
    let definition = Arc::new(build_definition(&config.pipeline)?);
    let engine = build_engine(config)?;
    let rule = EventRule::for_container(config.pipeline.input_container.clone());
    let router = TriggerRouter::new(engine, definition, rule);

    let mut settings = config.webhook.clone();
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }
    serve_webhook(router, settings).await?;
    Ok(())
}

pub fn graph(args: GraphArgs, config: &SeeCatsConfig) -> Result<()> {
    let definition = resolve_definition(args.definition.as_deref(), config)?;
    let rendered = match args.format {
        GraphFormat::Dot => definition_to_dot(&definition),
        GraphFormat::Yaml => definition.to_yaml()?,
        GraphFormat::Json => serde_json::to_string_pretty(&definition)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

pub fn validate(args: ValidateArgs, config: &SeeCatsConfig) -> Result<()> {
    let definition = load_definition(&args.path)?;
    validate_grants(&definition, &granted_registry(config)?)?;
    println!(
        "Definition '{}' is valid ({} states)",
        definition.name,
        definition.all_states().len()
    );
    Ok(())
}

pub fn status(args: StatusArgs, config: &SeeCatsConfig) -> Result<()> {
    let store = ExecutionStore::new(&config.engine.state_dir);

    let Some(raw_id) = args.execution_id else {
        let summaries = store.list()?;
        if summaries.is_empty() {
            println!("No executions found in {}", store.state_dir().display());
        }
        for summary in summaries.into_iter().take(args.limit) {
            println!(
                "{}  {:<9}  {}  {}",
                summary.execution_id,
                summary.status,
                summary.started_at.to_rfc3339(),
                summary.definition_name
            );
        }
        return Ok(());
    };

    let execution_id =
        Uuid::parse_str(&raw_id).with_context(|| format!("invalid execution id '{}'", raw_id))?;
    let execution = store.load(&execution_id)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        print_execution(&execution);
    }
    Ok(())
}

fn resolve_definition(path: Option<&Path>, config: &SeeCatsConfig) -> Result<WorkflowDefinition> {
    match path {
        Some(path) => Ok(load_definition(path)?),
        None => Ok(build_definition(&config.pipeline)?),
    }
}

fn http_client(config: &SeeCatsConfig) -> std::result::Result<HttpCapabilityClient, AppError> {
    let endpoints = config.capabilities.endpoints().ok_or_else(|| {
        AppError::new(
            ErrorCategory::ValidationError,
            "capability endpoints must be valid URLs",
        )
    })?;
    Ok(HttpCapabilityClient::new(
        endpoints,
        config.capabilities.request_timeout(),
    ))
}

fn granted_registry(config: &SeeCatsConfig) -> Result<OperatorRegistry> {
    let capabilities = http_client(config)?.into_capabilities();
    Ok(capability_registry(
        &capabilities,
        config.capabilities.retry.policy(),
    ))
}

/// Engine wired to the configured HTTP capabilities and execution store.
pub fn build_engine(config: &SeeCatsConfig) -> Result<WorkflowEngine> {
    let store = config
        .engine
        .persist_executions
        .then(|| ExecutionStore::new(&config.engine.state_dir));
    let settings = EngineSettings {
        default_timeout: config.engine.timeout(),
        trace: config.trace,
        store,
    };
    Ok(WorkflowEngine::new(granted_registry(config)?, settings))
}

fn print_execution(execution: &WorkflowExecution) {
    println!("Execution ID: {}", execution.execution_id);
    println!("Workflow: {}", execution.definition_name);
    println!("Status: {}", execution.status);
    println!("Started: {}", execution.started_at.to_rfc3339());
    if let Some(completed) = execution.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
    println!("States: {}", execution.trace.state_ids().join(" -> "));
    let open = execution.trace.open_states();
    if !open.is_empty() && execution.status.is_terminal() {
        println!("Open at deadline: {}", open.join(", "));
    }
    if let Some(error) = &execution.error {
        match &error.state_id {
            Some(state) => println!(
                "Error: [{}] {} (at '{}'): {}",
                error.code, error.category, state, error.message
            ),
            None => println!("Error: [{}] {}: {}", error.code, error.category, error.message),
        }
    }
}
