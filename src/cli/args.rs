use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// JSON file holding the storage event that triggers the execution
    #[arg(long, value_name = "FILE")]
    pub event: PathBuf,

    /// YAML workflow definition to run instead of the built-in pipeline
    #[arg(long, value_name = "FILE")]
    pub definition: Option<PathBuf>,

    /// Global execution deadline in whole seconds, e.g. `90s` or `5m` (default: engine.timeout_seconds)
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout_seconds)]
    pub timeout: Option<u64>,

    /// Print the full execution record as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address overriding webhook.bind
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct GraphArgs {
    /// YAML workflow definition to render instead of the built-in pipeline
    #[arg(long, value_name = "FILE")]
    pub definition: Option<PathBuf>,

    /// Output format (default: dot)
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub format: GraphFormat,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// YAML workflow definition to check
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Execution to inspect; lists recent executions when omitted
    #[arg(value_name = "EXECUTION_ID")]
    pub execution_id: Option<String>,

    /// Print the stored record as JSON
    #[arg(long)]
    pub json: bool,

    /// Maximum number of executions listed
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Dot,
    Yaml,
    Json,
}

/// Deadlines are tracked in whole seconds; `1500ms` is refused rather than rounded.
fn parse_timeout_seconds(value: &str) -> Result<u64, String> {
    let duration = humantime::parse_duration(value).map_err(|err| err.to_string())?;
    if duration.subsec_nanos() != 0 {
        return Err(format!("'{}' is not a whole number of seconds", value));
    }
    if duration.as_secs() == 0 {
        return Err("timeout must be at least 1s".into());
    }
    Ok(duration.as_secs())
}
