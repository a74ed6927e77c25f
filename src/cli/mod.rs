pub mod args;
pub mod commands;

pub use args::{GraphArgs, GraphFormat, RunArgs, ServeArgs, StatusArgs, ValidateArgs};
use crate::core::config::SeeCatsConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
WORKFLOW COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "seecats")]
#[command(version = crate::VERSION)]
#[command(about = "Classify newly stored images and act on the detected label")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a definition, run it against a saved event, then inspect the stored execution with status."
)]
pub struct Args {
    /// Configuration file (default: ./seecats.toml; missing file uses defaults)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Execute the workflow once for a storage event",
        long_about = "Run starts one execution with the event file as its payload, waits for a terminal status and prints the result. The exit code is non-zero unless the execution succeeded.",
        after_help = "Example:\n    seecats run --event ./event.json --timeout 2m"
    )]
    Run(RunArgs),
    #[command(
        about = "Accept trigger events over HTTP",
        long_about = "Serve listens for storage events on POST /v1/events and starts one execution per matching event. Requests must carry the bearer token named by webhook.auth_token_env.",
        after_help = "Example:\n    SEECATS_WEBHOOK_TOKEN=secret seecats serve --bind 0.0.0.0:8080"
    )]
    Serve(ServeArgs),
    #[command(
        about = "Render a workflow definition",
        long_about = "Graph prints the built-in pipeline (or a YAML definition) as Graphviz DOT, YAML or JSON.",
        after_help = "Example:\n    seecats graph --format dot | dot -Tsvg > pipeline.svg"
    )]
    Graph(GraphArgs),
    #[command(
        about = "Check a workflow definition without running it",
        long_about = "Validate parses a YAML definition and reports structural problems, cycles, bad reference paths and ungranted capabilities.",
        after_help = "Example:\n    seecats validate ./workflow.yaml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Inspect stored executions",
        long_about = "Status loads a persisted execution record and prints its status, trace and error; without an id it lists recent executions.",
        after_help = "Example:\n    seecats status 6f1c1f0e-3a8e-4d55-9a57-3d1f3c0c2b41"
    )]
    Status(StatusArgs),
}

pub async fn run(command: Command, config: SeeCatsConfig) -> crate::Result<()> {
    match command {
        Command::Run(run_args) => commands::run(run_args, &config).await,
        Command::Serve(serve_args) => commands::serve(serve_args, &config).await,
        Command::Graph(graph_args) => commands::graph(graph_args, &config),
        Command::Validate(validate_args) => commands::validate(validate_args, &config),
        Command::Status(status_args) => commands::status(status_args, &config),
    }
}
