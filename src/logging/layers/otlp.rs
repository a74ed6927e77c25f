use super::BoxLayer;
use crate::logging::config::OtlpSettings;
use anyhow::{anyhow, Context, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;

/// Owns the tracer provider; pending spans are flushed when it drops.
pub struct OtlpExport {
    provider: SdkTracerProvider,
}

impl Drop for OtlpExport {
    fn drop(&mut self) {
        if let Err(err) = self.provider.force_flush() {
            eprintln!("warning: failed to flush spans: {}", err);
        }
        let _ = self.provider.shutdown();
    }
}

/// Export spans over gRPC to `settings.endpoint`, tagged with the service name
/// and crate version.
pub fn otlp_layer<S>(settings: &OtlpSettings) -> Result<(BoxLayer<S>, OtlpExport)>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    let endpoint = settings
        .endpoint
        .clone()
        .ok_or_else(|| anyhow!("no OTLP endpoint configured"))?;
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
        .with_context(|| format!("failed to create OTLP exporter for {}", endpoint))?;

    let provider = SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_service_name(settings.service_name.clone())
                .with_attribute(KeyValue::new("service.version", crate::VERSION))
                .build(),
        )
        .with_batch_exporter(exporter)
        .build();

    let layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("seecats"));
    Ok((Box::new(layer), OtlpExport { provider }))
}
