use super::BoxLayer;
use crate::logging::config::{FileSinkSettings, LogRotation};
use crate::Result;
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

const FILE_PREFIX: &str = "seecats";
const FILE_SUFFIX: &str = "log";

/// Where the file sink writes. Without rotation the file is `<dir>/seecats.log`;
/// rotated files carry the period between prefix and suffix.
pub fn log_dir(settings: &FileSinkSettings, state_dir: &Path) -> Result<PathBuf> {
    let state_dir = lexical(state_dir);
    let Some(configured) = settings.dir.as_deref() else {
        return Ok(state_dir.join("logs"));
    };

    if let Ok(rest) = configured.strip_prefix("~") {
        let home = dirs_next::home_dir()
            .ok_or_else(|| anyhow!("logging.file.dir uses ~ but $HOME is unavailable"))?;
        return Ok(lexical(&home.join(rest)));
    }
    if configured.is_absolute() {
        return Ok(lexical(configured));
    }

    let joined = lexical(&state_dir.join(configured));
    if !joined.starts_with(&state_dir) {
        return Err(anyhow!(
            "logging.file.dir '{}' escapes state directory {}",
            configured.display(),
            state_dir.display()
        ));
    }
    Ok(joined)
}

/// Plain-text sink behind a non-blocking writer. The guard must outlive logging.
pub fn file_layer<S>(dir: &Path, rotation: LogRotation) -> Result<(BoxLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
        })
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .build(dir)
        .with_context(|| format!("failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .boxed();
    Ok((layer, guard))
}

// The log directory usually does not exist yet, so no canonicalize.
fn lexical(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut out, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other.as_os_str()),
            }
            out
        })
}
