use super::BoxLayer;
use crate::logging::config::{ConsoleOutput, LogFormat};
use std::io;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

/// Console sink, or `None` when the output is `none`.
///
/// JSON lines carry the current span list so `execution_id` and `state_id`
/// survive into log collectors; text output stays compact for terminals.
pub fn console_layer<S>(output: ConsoleOutput, format: LogFormat) -> Option<BoxLayer<S>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let writer = match output {
        ConsoleOutput::Stdout => BoxMakeWriter::new(io::stdout),
        ConsoleOutput::Stderr => BoxMakeWriter::new(io::stderr),
        ConsoleOutput::None => return None,
    };

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(output == ConsoleOutput::Stderr)
            .with_writer(writer)
            .boxed(),
    };
    Some(layer)
}
