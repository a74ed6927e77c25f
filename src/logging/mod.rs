pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleOutput, LogFormat, LoggingSettings};
pub use context::RunMode;

use crate::cli::Command;
use crate::core::config::SeeCatsConfig;
use crate::logging::config::{LogRotation, OtlpSettings};
use crate::logging::layers::{console, file, otlp, BoxLayer};
use crate::Result;
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Sinks resolved from settings and run mode, before anything is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPlan {
    pub mode: RunMode,
    pub level: String,
    pub console: ConsoleOutput,
    pub format: LogFormat,
    /// `None` when the file sink is disabled.
    pub log_dir: Option<PathBuf>,
    pub rotation: LogRotation,
    pub otlp: Option<OtlpSettings>,
}

impl LogPlan {
    /// Explicit settings win over the run mode's defaults.
    pub fn resolve(mode: RunMode, settings: &LoggingSettings, state_dir: &Path) -> Result<Self> {
        let log_dir = if settings.file.enabled {
            Some(file::log_dir(&settings.file, state_dir)?)
        } else {
            None
        };
        Ok(Self {
            mode,
            level: settings.level.clone(),
            console: settings.console.unwrap_or_else(|| mode.default_console()),
            format: settings.format.unwrap_or_else(|| mode.default_format()),
            log_dir,
            rotation: settings.file.rotation,
            otlp: settings
                .otlp
                .endpoint
                .as_ref()
                .map(|_| settings.otlp.clone()),
        })
    }
}

/// Keeps the file writer and span exporter alive; drop it last in `main`.
pub struct LoggingGuard {
    plan: LogPlan,
    _file: Option<WorkerGuard>,
    _otlp: Option<otlp::OtlpExport>,
}

impl LoggingGuard {
    pub fn plan(&self) -> &LogPlan {
        &self.plan
    }
}

/// Install the global subscriber for `command`.
pub fn init(command: &Command, config: &SeeCatsConfig) -> Result<LoggingGuard> {
    let plan = LogPlan::resolve(
        RunMode::for_command(command),
        &config.logging,
        &config.engine.state_dir,
    )?;
    install(plan)
}

/// Errors on a second call in the same process.
pub fn install(plan: LogPlan) -> Result<LoggingGuard> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        bail!("logging already initialized");
    }

    // RUST_LOG, when present, replaces the configured level entirely.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&plan.level))
        .with_context(|| format!("invalid log level '{}'", plan.level))?;

    let mut sinks: Vec<BoxLayer<Registry>> = Vec::new();

    let file_guard = match &plan.log_dir {
        Some(dir) => {
            let (layer, guard) = file::file_layer(dir, plan.rotation)?;
            sinks.push(layer);
            Some(guard)
        }
        None => None,
    };

    sinks.extend(console::console_layer(plan.console, plan.format));

    let (export, otlp_failure) = match plan.otlp.as_ref().map(otlp::otlp_layer) {
        Some(Ok((layer, export))) => {
            sinks.push(layer);
            (Some(export), None)
        }
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(sinks)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(err) = otlp_failure {
        tracing::warn!(error = %err, "span export disabled");
    }
    tracing::debug!(mode = ?plan.mode, console = %plan.console, "logging ready");

    Ok(LoggingGuard {
        plan,
        _file: file_guard,
        _otlp: export,
    })
}
