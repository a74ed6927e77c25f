use crate::cli::Command;
use crate::logging::config::{ConsoleOutput, LogFormat};
use std::env;

/// How the process was started, as far as log routing cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// `run`, `graph`, `validate` and `status` from a terminal.
    Interactive,
    /// `serve`: long-lived intake whose stdout is collected by a supervisor.
    Service,
    /// `SEECATS_HEADLESS=1`.
    Headless,
}

impl RunMode {
    pub fn for_command(command: &Command) -> Self {
        let headless = env::var("SEECATS_HEADLESS")
            .map(|value| value.trim() == "1")
            .unwrap_or(false);
        if headless {
            return RunMode::Headless;
        }
        match command {
            Command::Serve(_) => RunMode::Service,
            _ => RunMode::Interactive,
        }
    }

    /// Interactive commands print their results on stdout, so logs go to stderr.
    pub fn default_console(self) -> ConsoleOutput {
        match self {
            RunMode::Interactive => ConsoleOutput::Stderr,
            RunMode::Service => ConsoleOutput::Stdout,
            RunMode::Headless => ConsoleOutput::None,
        }
    }

    pub fn default_format(self) -> LogFormat {
        match self {
            RunMode::Service => LogFormat::Json,
            RunMode::Interactive | RunMode::Headless => LogFormat::Text,
        }
    }
}
